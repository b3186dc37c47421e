//! Typed keys

use keystash_codec::Persist;
use std::fmt;
use std::sync::Arc;

/// Identity of one stored slot plus its default value
///
/// The id is the persistence identity: it names the file the value lives in.
/// Using one id with two value types in the same store is an error.
pub struct Key<T> {
    id: Arc<str>,
    default: Arc<dyn Fn() -> T + Send + Sync>,
}

impl<T> Key<T>
where
    T: Persist + Default,
{
    /// Key whose default is `T::default()`
    pub fn new(id: impl AsRef<str>) -> Self {
        Self::with_default(id, T::default)
    }
}

impl<T> Key<T>
where
    T: Persist,
{
    /// Key with a custom default factory
    pub fn with_default<F>(id: impl AsRef<str>, default: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Key {
            id: Arc::from(id.as_ref()),
            default: Arc::new(default),
        }
    }

    /// Key id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// A fresh default value
    pub fn default_value(&self) -> T {
        (self.default)()
    }

    pub(crate) fn default_factory(&self) -> Arc<dyn Fn() -> T + Send + Sync> {
        Arc::clone(&self.default)
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Key {
            id: Arc::clone(&self.id),
            default: Arc::clone(&self.default),
        }
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.id).finish()
    }
}
