//! Labeled gauge vectors
//!
//! A `GaugeVec<N>` maps an `N`-tuple of label values to the current value of
//! the gauge. Values are stored as `f64` bit patterns in `AtomicU64` cells
//! inside a `DashMap`, so writers never block each other on different tuples
//! and a scrape never observes a torn value.

use dashmap::DashMap;
use std::borrow::Borrow;
use std::fmt::Write;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Escape a label value for the text exposition format.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Format a sample value the way Prometheus parses it.
fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

/// Check a metric or label name against `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Label values viewed as borrowed strings.
///
/// Owned keys and caller-supplied `[&str; N]` tuples hash and compare through
/// this view, so a lookup of an existing tuple needs no allocation.
trait LabelView<const N: usize> {
    fn view(&self) -> [&str; N];
}

/// Owned label values stored as the map key.
struct LabelKey<const N: usize>([String; N]);

impl<const N: usize> LabelView<N> for LabelKey<N> {
    fn view(&self) -> [&str; N] {
        std::array::from_fn(|i| self.0[i].as_str())
    }
}

impl<'l, const N: usize> LabelView<N> for [&'l str; N] {
    fn view(&self) -> [&str; N] {
        *self
    }
}

impl<'a, const N: usize> Hash for dyn LabelView<N> + 'a {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.view().hash(state);
    }
}

impl<'a, const N: usize> PartialEq for dyn LabelView<N> + 'a {
    fn eq(&self, other: &Self) -> bool {
        self.view() == other.view()
    }
}

impl<'a, const N: usize> Eq for dyn LabelView<N> + 'a {}

impl<const N: usize> Hash for LabelKey<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.view().hash(state);
    }
}

impl<const N: usize> PartialEq for LabelKey<N> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<const N: usize> Eq for LabelKey<N> {}

impl<'a, const N: usize> Borrow<dyn LabelView<N> + 'a> for LabelKey<N> {
    fn borrow(&self) -> &(dyn LabelView<N> + 'a) {
        self
    }
}

/// A metric family that can be written to a scrape response.
pub trait Family: Send + Sync {
    /// Fully qualified metric name.
    fn name(&self) -> &str;

    /// Number of label combinations currently holding a value.
    fn series_count(&self) -> usize;

    /// Append `# HELP`, `# TYPE` and one line per sample to `out`.
    fn render(&self, out: &mut String);
}

/// Gauge with a fixed label schema of arity `N`.
pub struct GaugeVec<const N: usize> {
    name: String,
    help: &'static str,
    label_names: [&'static str; N],
    values: DashMap<LabelKey<N>, AtomicU64>,
}

impl<const N: usize> GaugeVec<N> {
    pub fn new(name: impl Into<String>, help: &'static str, label_names: [&'static str; N]) -> Self {
        Self {
            name: name.into(),
            help,
            label_names,
            values: DashMap::new(),
        }
    }

    pub fn label_names(&self) -> &[&'static str; N] {
        &self.label_names
    }

    /// Set the current value for a label combination, creating it on first use.
    ///
    /// Label values are only copied the first time a combination is seen.
    pub fn set(&self, labels: [&str; N], value: f64) {
        let bits = value.to_bits();

        if let Some(cell) = self.values.get(&labels as &dyn LabelView<N>) {
            cell.store(bits, Ordering::Relaxed);
            return;
        }

        self.values
            .entry(LabelKey(labels.map(str::to_owned)))
            .or_insert_with(|| AtomicU64::new(bits))
            .store(bits, Ordering::Relaxed);
    }

    /// Current value for a label combination, if it was ever set.
    pub fn get(&self, labels: [&str; N]) -> Option<f64> {
        self.values
            .get(&labels as &dyn LabelView<N>)
            .map(|cell| f64::from_bits(cell.load(Ordering::Relaxed)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of all samples, sorted by label values.
    pub fn snapshot(&self) -> Vec<([String; N], f64)> {
        let mut samples: Vec<([String; N], f64)> = self
            .values
            .iter()
            .map(|e| (e.key().0.clone(), f64::from_bits(e.value().load(Ordering::Relaxed))))
            .collect();
        samples.sort_by(|a, b| a.0.cmp(&b.0));
        samples
    }
}

impl<const N: usize> Family for GaugeVec<N> {
    fn name(&self) -> &str {
        &self.name
    }

    fn series_count(&self) -> usize {
        self.len()
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} gauge", self.name);

        for (labels, value) in self.snapshot() {
            let label_str = self
                .label_names
                .iter()
                .zip(labels.iter())
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                .collect::<Vec<_>>()
                .join(",");

            if label_str.is_empty() {
                let _ = writeln!(out, "{} {}", self.name, format_value(value));
            } else {
                let _ = writeln!(out, "{}{{{}}} {}", self.name, label_str, format_value(value));
            }
        }
    }
}

impl<const N: usize> std::fmt::Debug for GaugeVec<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaugeVec")
            .field("name", &self.name)
            .field("labels", &self.label_names)
            .field("series", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn backend_gauge() -> GaugeVec<3> {
        GaugeVec::new("lb_backend_live", "Backend Alive.", ["server", "host", "port"])
    }

    #[test]
    fn test_set_then_get() {
        let g = backend_gauge();
        g.set(["web", "10.0.0.1", "80"], 1.0);
        assert_eq!(g.get(["web", "10.0.0.1", "80"]), Some(1.0));
    }

    #[test]
    fn test_get_unknown_tuple() {
        let g = backend_gauge();
        assert_eq!(g.get(["web", "10.0.0.1", "80"]), None);
        assert!(g.is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let g = GaugeVec::new("lb_server_active_connections", "help", ["server"]);
        g.set(["web"], 5.0);
        g.set(["web"], 3.0);
        assert_eq!(g.get(["web"]), Some(3.0));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_existing_tuple_found_by_borrowed_labels() {
        let g = backend_gauge();
        let host = String::from("10.0.0.1");
        g.set(["web", host.as_str(), "80"], 1.0);

        // equal values held in different buffers resolve to the stored tuple
        for n in 0..10 {
            let server = format!("we{}", 'b');
            let port = 80.to_string();
            g.set([server.as_str(), "10.0.0.1", port.as_str()], f64::from(n));
        }

        assert_eq!(g.len(), 1);
        assert_eq!(g.get(["web", "10.0.0.1", "80"]), Some(9.0));
        assert_eq!(g.get(["web", "10.0.0.1", "8"]), None);
    }

    fn hash_of(v: &dyn LabelView<2>) -> u64 {
        use std::collections::hash_map::DefaultHasher;

        let mut hasher = DefaultHasher::new();
        v.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_label_key_matches_borrowed_view() {
        let owned = LabelKey(["web".to_string(), "h".to_string()]);
        let borrowed = ["web", "h"];

        assert_eq!(hash_of(&owned), hash_of(&borrowed));
        assert_eq!(owned.view(), borrowed.view());
        assert_ne!(hash_of(&owned), hash_of(&["web", "g"]));
    }

    #[test]
    fn test_tuples_are_independent() {
        let g = backend_gauge();
        g.set(["web", "10.0.0.1", "80"], 1.0);
        g.set(["web", "10.0.0.1", "81"], 0.0);
        g.set(["api", "10.0.0.1", "80"], 7.0);

        assert_eq!(g.len(), 3);
        assert_eq!(g.get(["web", "10.0.0.1", "80"]), Some(1.0));
        assert_eq!(g.get(["web", "10.0.0.1", "81"]), Some(0.0));
        assert_eq!(g.get(["api", "10.0.0.1", "80"]), Some(7.0));
    }

    #[test]
    fn test_render_format() {
        let g = backend_gauge();
        g.set(["web", "10.0.0.2", "80"], 0.0);
        g.set(["web", "10.0.0.1", "80"], 1.0);

        let mut out = String::new();
        g.render(&mut out);

        let expected = "# HELP lb_backend_live Backend Alive.\n\
                        # TYPE lb_backend_live gauge\n\
                        lb_backend_live{server=\"web\",host=\"10.0.0.1\",port=\"80\"} 1\n\
                        lb_backend_live{server=\"web\",host=\"10.0.0.2\",port=\"80\"} 0\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_render_escapes_label_values() {
        let g = GaugeVec::new("lb_server_count", "help", ["server"]);
        g.set(["we\"b\\1\nx"], 2.0);

        let mut out = String::new();
        g.render(&mut out);
        assert!(out.contains(r#"lb_server_count{server="we\"b\\1\nx"} 2"#));
    }

    #[test]
    fn test_render_without_labels() {
        let g: GaugeVec<0> = GaugeVec::new("lb_up", "help", []);
        g.set([], 1.0);

        let mut out = String::new();
        g.render(&mut out);
        assert!(out.ends_with("lb_up 1\n"));
    }

    #[test]
    fn test_format_value_special() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(1000.0), "1000");
        assert_eq!(format_value(0.5), "0.5");
    }

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("lb_server_count"));
        assert!(is_valid_name("_x:y1"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name("lb-server"));
        assert!(!is_valid_name("lb server"));
    }

    #[test]
    fn test_concurrent_writers_same_tuple() {
        use std::thread;

        let g = Arc::new(GaugeVec::new("lb_server_rx_total", "help", ["server"]));
        let mut handles = vec![];

        for i in 0..8u32 {
            let g = g.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    g.set(["web"], f64::from(i) * 1.5);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let written: Vec<f64> = (0..8u32).map(|i| f64::from(i) * 1.5).collect();
        let value = g.get(["web"]).unwrap();
        assert!(written.contains(&value), "unexpected value {}", value);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_concurrent_writers_distinct_tuples() {
        use std::thread;

        let g = Arc::new(backend_gauge());
        let mut handles = vec![];

        for i in 0..10 {
            let g = g.clone();
            handles.push(thread::spawn(move || {
                let port = (8000 + i).to_string();
                for n in 0..100 {
                    g.set(["web", "10.0.0.1", port.as_str()], f64::from(n));
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(g.len(), 10);
        assert_eq!(g.get(["web", "10.0.0.1", "8005"]), Some(99.0));
    }

    #[test]
    fn test_debug_output() {
        let g = backend_gauge();
        let debug_str = format!("{:?}", g);
        assert!(debug_str.contains("lb_backend_live"));
        assert!(debug_str.contains("series"));
    }
}
