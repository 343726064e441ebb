// Entity Models
// Reference data the ingestion core consults but never mutates.

pub mod account;

pub use account::{Account, AccountDirectory, AccountRegistry, BUNDLED_ACCOUNTS};
