// Derived code images: a QR code for the ID number and a barcode for the
// barcode field. Both are pure functions of their input and are memoized
// per value.

pub mod barcode;
pub mod qr;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

pub use barcode::{select_symbology, Barcode, Symbology};

/// Bounded memo table. When full it is cleared wholesale; inputs are
/// cheap to recompute and typing produces many short-lived values.
pub struct Memo<K, V> {
    entries: Mutex<HashMap<K, V>>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> Memo<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get_or_compute<F>(&self, key: &K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        if let Some(hit) = self.lock().get(key) {
            return hit.clone();
        }
        // Computed outside the lock so slow encodes do not serialize requests.
        let value = compute(key);
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.clear();
        }
        entries.insert(key.clone(), value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, V>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// QR and barcode images for one record.
#[derive(Debug, Clone, Default)]
pub struct DerivedCodes {
    pub qr_png: Option<Arc<Vec<u8>>>,
    pub barcode: Option<Arc<Barcode>>,
}

pub struct CodeCache {
    qr: Memo<String, Option<Arc<Vec<u8>>>>,
    barcode: Memo<String, Option<Arc<Barcode>>>,
}

impl CodeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            qr: Memo::new(capacity),
            barcode: Memo::new(capacity),
        }
    }

    pub fn qr(&self, id_number: &str) -> Option<Arc<Vec<u8>>> {
        self.qr
            .get_or_compute(&id_number.to_string(), |value| qr::render_png(value).map(Arc::new))
    }

    pub fn barcode(&self, value: &str) -> Option<Arc<Barcode>> {
        self.barcode
            .get_or_compute(&value.to_string(), |value| Barcode::encode(value).map(Arc::new))
    }

    pub fn derive(&self, id_number: &str, barcode: &str) -> DerivedCodes {
        DerivedCodes {
            qr_png: self.qr(id_number),
            barcode: self.barcode(barcode),
        }
    }
}

impl Default for CodeCache {
    fn default() -> Self {
        Self::new(256)
    }
}
