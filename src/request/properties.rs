//! Name-keyed attribute store attached to each logical request.
//!
//! The processing layer uses properties to pass values between filters,
//! routing and handlers for the lifetime of one request. Values are stored
//! type-erased behind `Arc<dyn Any + Send + Sync>` so they can be shared
//! cheaply; typed accessors hide the erasure.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    sync::Arc,
};

/// String-keyed properties of a single request.
///
/// # Examples
///
/// ```
/// use duplex_bridge::request::RequestProperties;
///
/// let mut props = RequestProperties::default();
/// props.insert("tenant", String::from("acme"));
/// assert_eq!(props.get::<String>("tenant").as_deref().map(String::as_str), Some("acme"));
/// assert!(props.get::<u32>("tenant").is_none());
/// ```
#[derive(Clone, Default)]
pub struct RequestProperties {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl RequestProperties {
    /// Store `value` under `name`, replacing any previous value.
    pub fn insert<T>(&mut self, name: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.values.insert(name.into(), Arc::new(value));
    }

    /// Value stored under `name`, if present and of type `T`.
    #[must_use]
    pub fn get<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.values
            .get(name)
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
    }

    /// Remove the value stored under `name`, returning whether one existed.
    pub fn remove(&mut self, name: &str) -> bool { self.values.remove(name).is_some() }

    /// Whether a value is stored under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.values.contains_key(name) }

    /// Names of all stored properties, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> { self.values.keys().map(String::as_str) }

    /// Number of stored properties.
    #[must_use]
    pub fn len(&self) -> usize { self.values.len() }

    /// Whether no properties are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}

impl fmt::Debug for RequestProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}
