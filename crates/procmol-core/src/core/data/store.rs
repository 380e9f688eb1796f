use super::histogram::{Axis, Data, Histogram};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum DataItem {
    Histogram(Histogram),
    Data(Data),
    Value(f64),
}

/// Named results shared between a procedure and its host, keyed `{prefix}//{name}`.
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    items: BTreeMap<String, DataItem>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(prefix: &str, name: &str) -> String {
        format!("{prefix}//{name}")
    }

    /// Returns the histogram at `key`, creating it when absent or when its axes differ
    /// from `axes`.
    pub fn realise_histogram(&mut self, key: &str, axes: &[Axis]) -> &mut Histogram {
        let reusable = matches!(
            self.items.get(key),
            Some(DataItem::Histogram(h)) if h.axes() == axes
        );
        if !reusable {
            self.items.insert(
                key.to_string(),
                DataItem::Histogram(Histogram::new(axes.to_vec())),
            );
        }
        match self.items.get_mut(key) {
            Some(DataItem::Histogram(h)) => h,
            _ => unreachable!("histogram was inserted above"),
        }
    }

    pub fn histogram(&self, key: &str) -> Option<&Histogram> {
        match self.items.get(key) {
            Some(DataItem::Histogram(h)) => Some(h),
            _ => None,
        }
    }

    pub fn histogram_mut(&mut self, key: &str) -> Option<&mut Histogram> {
        match self.items.get_mut(key) {
            Some(DataItem::Histogram(h)) => Some(h),
            _ => None,
        }
    }

    pub fn set_data(&mut self, key: &str, data: Data) {
        self.items.insert(key.to_string(), DataItem::Data(data));
    }

    pub fn data(&self, key: &str) -> Option<&Data> {
        match self.items.get(key) {
            Some(DataItem::Data(d)) => Some(d),
            _ => None,
        }
    }

    pub fn set_value(&mut self, key: &str, value: f64) {
        self.items.insert(key.to_string(), DataItem::Value(value));
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        match self.items.get(key) {
            Some(DataItem::Value(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataItem)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> Vec<Axis> {
        vec![Axis::new(0.0, 2.0, 1.0).unwrap()]
    }

    #[test]
    fn realise_reuses_matching_histogram() {
        let mut store = DataStore::new();
        let key = DataStore::key("Analysis", "RDF");
        assert_eq!(key, "Analysis//RDF");

        store.realise_histogram(&key, &axis()).bin(&[0.5]);
        let h = store.realise_histogram(&key, &axis());
        assert_eq!(h.n_binned(), 1);
    }

    #[test]
    fn realise_replaces_histogram_with_different_axes() {
        let mut store = DataStore::new();
        store.realise_histogram("k", &axis()).bin(&[0.5]);
        let wider = vec![Axis::new(0.0, 4.0, 1.0).unwrap()];
        let h = store.realise_histogram("k", &wider);
        assert_eq!(h.n_binned(), 0);
        assert_eq!(h.counts().len(), 4);
    }

    #[test]
    fn typed_accessors_do_not_cross_kinds() {
        let mut store = DataStore::new();
        store.set_value("v", 2.5);
        assert_eq!(store.value("v"), Some(2.5));
        assert!(store.data("v").is_none());
        assert!(store.histogram("v").is_none());
        assert_eq!(store.len(), 1);
    }
}
