//! Tolerant, typed access to the browser-profile key-value store.
//!
//! Everything the earlier pipeline stages (upload, column selection, detection,
//! correction) leave behind lives in this store. Reads never fail: a missing key,
//! a value that isn't JSON, or JSON of the wrong shape all collapse to the caller's
//! default. Only writes report errors.
//!
//! Change notification is an explicit subscription: [`StateStore::subscribe`]
//! returns a [`Subscription`] that stays registered until dropped. Writes made
//! through this handle notify immediately; writes from other tabs arrive through
//! [`StateStore::notify_external`] (wired to the window `storage` event on the web).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::core::error::StoreError;

/// Keys the report consumes. The string forms are shared with the rest of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    LastReportPath,
    CorrectionSummary,
    CorrectedFilePath,
    SelectedColumns,
    CategoricalColumns,
    ContinuousColumns,
    BiasResults,
    SkewnessResults,
    SelectedFilePath,
    PreprocessedFilePath,
    UploadedFilePath,
    ApiBaseUrl,
}

impl StoreKey {
    pub const ALL: [StoreKey; 12] = [
        StoreKey::LastReportPath,
        StoreKey::CorrectionSummary,
        StoreKey::CorrectedFilePath,
        StoreKey::SelectedColumns,
        StoreKey::CategoricalColumns,
        StoreKey::ContinuousColumns,
        StoreKey::BiasResults,
        StoreKey::SkewnessResults,
        StoreKey::SelectedFilePath,
        StoreKey::PreprocessedFilePath,
        StoreKey::UploadedFilePath,
        StoreKey::ApiBaseUrl,
    ];

    /// Source dataset keys, most specific first.
    pub const SOURCE_PATH_CANDIDATES: [StoreKey; 3] = [
        StoreKey::SelectedFilePath,
        StoreKey::PreprocessedFilePath,
        StoreKey::UploadedFilePath,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreKey::LastReportPath => "lastReportPath",
            StoreKey::CorrectionSummary => "correctionSummary",
            StoreKey::CorrectedFilePath => "correctedFilePath",
            StoreKey::SelectedColumns => "selectedColumns",
            StoreKey::CategoricalColumns => "categorical",
            StoreKey::ContinuousColumns => "continuous",
            StoreKey::BiasResults => "biasResults",
            StoreKey::SkewnessResults => "skewnessResults",
            StoreKey::SelectedFilePath => "selectedFilePath",
            StoreKey::PreprocessedFilePath => "preprocessedFilePath",
            StoreKey::UploadedFilePath => "uploadedFilePath",
            StoreKey::ApiBaseUrl => "apiBaseUrl",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == raw)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw string storage underneath the typed adapter.
pub trait StoreBackend {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str) -> Result<(), String>;
    fn remove(&self, key: &str);
}

/// Process-local backend used off the web and in tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), String> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// `window.localStorage`, persisted across reloads for one browser profile.
#[cfg(target_arch = "wasm32")]
pub struct LocalStorageBackend {
    storage: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorageBackend {
    pub fn open() -> Option<Self> {
        let storage = web_sys::window()?.local_storage().ok()??;
        Some(Self { storage })
    }
}

#[cfg(target_arch = "wasm32")]
impl StoreBackend for LocalStorageBackend {
    fn read(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), String> {
        self.storage
            .set_item(key, value)
            .map_err(|_| "localStorage rejected the write (quota or privacy mode)".to_string())
    }

    fn remove(&self, key: &str) {
        self.storage.remove_item(key).ok();
    }
}

type Callback = Rc<dyn Fn(StoreKey)>;

struct Observer {
    id: u64,
    keys: Vec<StoreKey>,
    callback: Callback,
}

#[derive(Default)]
struct Observers {
    next_id: Cell<u64>,
    entries: RefCell<Vec<Observer>>,
}

/// Registration handle returned by [`StateStore::subscribe`]; unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    observers: Weak<Observers>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers
                .entries
                .borrow_mut()
                .retain(|observer| observer.id != self.id);
        }
    }
}

/// Shared handle over a [`StoreBackend`]. Clones share the backend and subscribers.
#[derive(Clone)]
pub struct StateStore {
    backend: Rc<dyn StoreBackend>,
    observers: Rc<Observers>,
}

impl StateStore {
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            backend: Rc::new(backend),
            observers: Rc::new(Observers::default()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Browser store when available, otherwise a process-local one.
    pub fn for_platform() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(backend) = LocalStorageBackend::open() {
                return Self::new(backend);
            }
            tracing::warn!("localStorage unavailable; report state will not persist");
        }

        Self::in_memory()
    }

    /// Typed read. Decodes JSON first, then retries with the raw text as a JSON
    /// string (values written without `JSON.stringify`), then gives up with `default`.
    pub fn get<T: DeserializeOwned>(&self, key: StoreKey, default: T) -> T {
        let Some(raw) = self.backend.read(key.as_str()) else {
            return default;
        };

        if let Ok(value) = serde_json::from_str::<T>(&raw) {
            return value;
        }

        match serde_json::from_value::<T>(Value::String(raw)) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(key = %key, error = %err, "store value undecodable; using default");
                default
            }
        }
    }

    /// Untyped read for shapes that are normalized downstream.
    pub fn get_value(&self, key: StoreKey) -> Value {
        self.get(key, Value::Null)
    }

    /// First non-blank string among `keys`, in order.
    pub fn first_path(&self, keys: &[StoreKey]) -> Option<String> {
        keys.iter()
            .map(|key| self.get(*key, String::new()))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: StoreKey, value: &T) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(value).map_err(|err| StoreError::Write {
            key: key.as_str(),
            reason: err.to_string(),
        })?;
        self.backend
            .write(key.as_str(), &encoded)
            .map_err(|reason| StoreError::Write {
                key: key.as_str(),
                reason,
            })?;
        self.dispatch(key);
        Ok(())
    }

    pub fn remove(&self, key: StoreKey) {
        self.backend.remove(key.as_str());
        self.dispatch(key);
    }

    /// Drops every key the report knows about and tells subscribers.
    pub fn clear(&self) {
        for key in StoreKey::ALL {
            self.backend.remove(key.as_str());
        }
        for key in StoreKey::ALL {
            self.dispatch(key);
        }
    }

    pub fn subscribe(&self, keys: &[StoreKey], callback: impl Fn(StoreKey) + 'static) -> Subscription {
        let id = self.observers.next_id.get();
        self.observers.next_id.set(id.wrapping_add(1));
        self.observers.entries.borrow_mut().push(Observer {
            id,
            keys: keys.to_vec(),
            callback: Rc::new(callback),
        });
        Subscription {
            id,
            observers: Rc::downgrade(&self.observers),
        }
    }

    /// Forward a change made elsewhere (another tab). `None` means the whole
    /// store was cleared. Unknown keys are ignored.
    pub fn notify_external(&self, raw_key: Option<&str>) {
        match raw_key {
            Some(raw) => {
                if let Some(key) = StoreKey::parse(raw) {
                    self.dispatch(key);
                }
            }
            None => {
                for key in StoreKey::ALL {
                    self.dispatch(key);
                }
            }
        }
    }

    fn dispatch(&self, key: StoreKey) {
        // Collect first so callbacks may subscribe or unsubscribe re-entrantly.
        let targets: Vec<Callback> = self
            .observers
            .entries
            .borrow()
            .iter()
            .filter(|observer| observer.keys.contains(&key))
            .map(|observer| observer.callback.clone())
            .collect();

        for callback in targets {
            callback(key);
        }
    }
}

impl PartialEq for StateStore {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.observers, &other.observers)
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("subscribers", &self.observers.entries.borrow().len())
            .finish()
    }
}

/// Keeps the window `storage` listener alive; removing it on drop.
#[cfg(target_arch = "wasm32")]
pub struct CrossTabListener {
    closure: wasm_bindgen::closure::Closure<dyn FnMut(web_sys::StorageEvent)>,
}

#[cfg(target_arch = "wasm32")]
impl Drop for CrossTabListener {
    fn drop(&mut self) {
        use wasm_bindgen::JsCast;

        if let Some(window) = web_sys::window() {
            window
                .remove_event_listener_with_callback("storage", self.closure.as_ref().unchecked_ref())
                .ok();
        }
    }
}

/// Route `storage` events from other tabs into `store`'s subscribers.
#[cfg(target_arch = "wasm32")]
pub fn listen_cross_tab(store: &StateStore) -> Option<CrossTabListener> {
    use wasm_bindgen::{closure::Closure, JsCast};

    let window = web_sys::window()?;
    let target = store.clone();
    let closure = Closure::<dyn FnMut(web_sys::StorageEvent)>::new(move |event: web_sys::StorageEvent| {
        target.notify_external(event.key().as_deref());
    });
    window
        .add_event_listener_with_callback("storage", closure.as_ref().unchecked_ref())
        .ok()?;
    Some(CrossTabListener { closure })
}
