//! Concrete implementations behind the werecord contracts: key-material
//! decryption, passphrase derivation, the SQLCipher store, a `su`-backed file
//! channel and TOML-persisted preferences.

pub mod key_info;
pub mod opener;
pub mod passphrase;
pub mod preferences;
pub mod shell_channel;
pub mod store;
