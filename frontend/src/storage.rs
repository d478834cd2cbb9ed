use taskdesk_shared::{error::StorageResult, KeyValueStore, StorageError};
use web_sys::Storage;

/// `KeyValueStore` over `window.localStorage`.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage;

impl LocalStorage {
    fn storage(&self) -> StorageResult<Storage> {
        web_sys::window()
            .and_then(|window| window.local_storage().ok().flatten())
            .ok_or(StorageError::Unavailable)
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage()?
            .get_item(key)
            .map_err(|_| StorageError::Unavailable)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage()?
            .set_item(key, value)
            .map_err(|e| StorageError::Write {
                key: key.to_string(),
                reason: format!("{e:?}"),
            })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.storage()?
            .remove_item(key)
            .map_err(|_| StorageError::Unavailable)
    }
}
