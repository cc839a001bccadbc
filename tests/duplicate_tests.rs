//! Integration tests for subtree duplication and truncate-and-recopy.

use std::path::Path;
use std::sync::Arc;

use nctree::core::{
    AttrTarget, DimId, GroupId, GroupListing, StorageBackend, VarId,
};
use nctree::prelude::*;
use nctree::{truncate, AttrValue, Duplicator, ExistingPolicy, MemoryBackend, Truncation};
use parking_lot::Mutex;
use tempfile::tempdir;

fn series(n: usize) -> ArrayData {
    ArrayData::from_vec(&[n], (1..=n).map(|i| i as f64).collect::<Vec<_>>()).unwrap()
}

/// Source tree:
///
/// ```text
/// /          time (growable, 10), station = 2
/// /obs       temp(time, station), count(time)
/// /obs/qc    flag(time)
/// /meta      offset(station), note
/// ```
fn populate(root: &Group) {
    root.set_attribute("title", "source").unwrap();
    root.add_dimension("time", DimLength::Growable).unwrap();
    root.add_dimension("station", DimLength::Fixed(2)).unwrap();

    let obs = root.add_group("obs").unwrap();
    let temp = ArrayData::from_vec(&[10, 2], (0..20).map(|i| i as f64).collect::<Vec<_>>()).unwrap();
    obs.add_variable_with_data("temp", &["time", "station"], temp).unwrap();
    obs.add_variable_with_data("count", &["time"], ArrayData::from_vec(&[10], (1..=10).collect::<Vec<i32>>()).unwrap())
        .unwrap();
    obs.set_variable_attribute("temp", "units", "degC").unwrap();

    let qc = obs.add_group("qc").unwrap();
    qc.add_variable_with_data("flag", &["time"], series(10)).unwrap();

    let meta = root.add_group("meta").unwrap();
    meta.set_attribute("note", "no data here").unwrap();
    meta.add_variable_with_data("offset", &["station"], ArrayData::from_vec(&[2], vec![0.5, -0.5]).unwrap())
        .unwrap();
}

fn write_source(path: &Path) {
    let ds = Dataset::create(path, FormatOptions::compact()).unwrap();
    populate(ds.root());
    ds.close().unwrap();
}

/// Recursively compare structure and data of two groups.
fn assert_same_tree(a: &Group, b: &Group) {
    assert_eq!(a.name(), b.name());
    assert_eq!(a.attributes().user_entries().count(), b.attributes().user_entries().count());
    for (key, value) in a.attributes().user_entries() {
        assert_eq!(b.attribute(key).as_ref(), Some(value), "attribute {} of {}", key, a.path());
    }

    let dims_a: Vec<(String, DimLength, usize)> = a
        .own_dimensions()
        .iter()
        .map(|d| (d.name().to_string(), d.length(), d.len()))
        .collect();
    let dims_b: Vec<(String, DimLength, usize)> = b
        .own_dimensions()
        .iter()
        .map(|d| (d.name().to_string(), d.length(), d.len()))
        .collect();
    assert_eq!(dims_a, dims_b, "dimensions of {}", a.path());

    let vars_a = a.variables();
    let vars_b = b.variables();
    assert_eq!(vars_a.len(), vars_b.len(), "variables of {}", a.path());
    for (va, vb) in vars_a.iter().zip(&vars_b) {
        assert_eq!(va.name(), vb.name());
        assert_eq!(va.scalar_type(), vb.scalar_type());
        assert_eq!(va.dimension_names(), vb.dimension_names());
        let (attrs_a, attrs_b) = (va.attributes(), vb.attributes());
        assert_eq!(
            attrs_a.user_entries().count(),
            attrs_b.user_entries().count(),
            "attributes of {}/{}",
            a.path(),
            va.name()
        );
        for (key, value) in attrs_a.user_entries() {
            assert_eq!(attrs_b.get(key), Some(value), "attribute {} of {}/{}", key, a.path(), va.name());
        }
        assert_eq!(a.read(va.name()).unwrap(), b.read(vb.name()).unwrap());
    }

    let children_a = a.children();
    let children_b = b.children();
    assert_eq!(children_a.len(), children_b.len());
    for (ca, cb) in children_a.iter().zip(&children_b) {
        assert_same_tree(ca, cb);
    }
}

#[test]
fn test_whole_dataset_copy_roundtrip() {
    let dir = tempdir().unwrap();
    let (src, dst) = (dir.path().join("src.nct"), dir.path().join("dst.nct"));
    write_source(&src);

    let source = Dataset::open(&src, false).unwrap();
    let dest = Dataset::create(&dst, FormatOptions::compact()).unwrap();
    let report = Duplicator::new(source.root(), &DuplicateOptions::new())
        .unwrap()
        .copy_into(dest.root())
        .unwrap();
    assert_eq!(report.groups, 3);
    assert_eq!(report.dimensions, 2);
    assert_eq!(report.variables, 4);
    assert_eq!(report.arrays_written, 4);
    assert_eq!(report.values_written, 42);
    dest.close().unwrap();

    let copy = Dataset::open(&dst, false).unwrap();
    assert_same_tree(source.root(), copy.root());
    copy.close().unwrap();
    source.close().unwrap();
}

#[test]
fn test_selection_keeps_listed_positions_in_order() {
    let ds = Dataset::in_memory().unwrap();
    let root = ds.root();
    populate(root);

    let options = DuplicateOptions::new().select("time", IndexSelection::indices([6, 2, 4]));
    let obs = root.group("obs").unwrap();
    let target = Dataset::in_memory().unwrap();
    let copy = obs.duplicate(target.root(), "obs_even", &options).unwrap();

    assert_eq!(copy.path(), "/obs_even");
    // Dimensions the source inherits are declared on the copied group.
    let time = copy.local_dimension("time").unwrap();
    assert_eq!(time.group_path(), "/obs_even");
    assert_eq!(time.len(), 3);

    let count = copy.read("count").unwrap();
    assert_eq!(count.as_real().unwrap().to_vec::<i32>().unwrap(), vec![6, 2, 4]);
    let temp = copy.read("temp").unwrap();
    assert_eq!(
        temp.as_real().unwrap().to_vec::<f64>().unwrap(),
        vec![10.0, 11.0, 2.0, 3.0, 6.0, 7.0]
    );
    // Nested groups see the same reduced axis.
    let flag = copy.read("qc/flag").unwrap();
    assert_eq!(flag.as_real().unwrap().to_vec::<f64>().unwrap(), vec![6.0, 2.0, 4.0]);
    assert_eq!(
        copy.variable("temp").unwrap().attributes().get("units"),
        Some(&AttrValue::from("degC"))
    );

    // The source is untouched.
    assert_eq!(root.dimension("/time").unwrap().len(), 10);
}

#[test]
fn test_duplicate_rejects_bad_targets() {
    let ds = Dataset::in_memory().unwrap();
    let root = ds.root();
    populate(root);
    let obs = root.group("obs").unwrap();
    let qc = obs.group("qc").unwrap();

    let err = obs.duplicate(&qc, "loop", &DuplicateOptions::new()).unwrap_err();
    assert!(matches!(err, Error::SchemaInconsistent(_)));

    let err = obs.duplicate(root, "meta", &DuplicateOptions::new()).unwrap_err();
    assert!(matches!(err, Error::DuplicateName { .. }));

    let bad = DuplicateOptions::new().select("time", IndexSelection::indices([11]));
    let err = obs.duplicate(root, "copy", &bad).unwrap_err();
    assert!(matches!(err, Error::InvalidTruncation(_)));
    assert!(root.child("copy").is_none());
}

#[test]
fn test_copy_into_existing_destination() {
    let ds = Dataset::in_memory().unwrap();
    populate(ds.root());

    let dest = Dataset::in_memory().unwrap();
    dest.root().add_dimension("station", DimLength::Fixed(2)).unwrap();
    Duplicator::new(ds.root(), &DuplicateOptions::new())
        .unwrap()
        .copy_into(dest.root())
        .unwrap();
    assert_eq!(dest.root().dimension("station").unwrap().len(), 2);

    let strict = DuplicateOptions::new().existing(ExistingPolicy::Fail);
    let other = Dataset::in_memory().unwrap();
    other.root().add_dimension("station", DimLength::Fixed(2)).unwrap();
    let err = Duplicator::new(ds.root(), &strict)
        .unwrap()
        .copy_into(other.root())
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateName { .. }));

    let clash = Dataset::in_memory().unwrap();
    clash.root().add_dimension("station", DimLength::Fixed(5)).unwrap();
    let err = Duplicator::new(ds.root(), &DuplicateOptions::new())
        .unwrap()
        .copy_into(clash.root())
        .unwrap_err();
    assert!(matches!(err, Error::SchemaInconsistent(_)));
}

#[test]
fn test_truncate_file() {
    let dir = tempdir().unwrap();
    let (src, dst) = (dir.path().join("src.nct"), dir.path().join("short.nct"));
    write_source(&src);

    truncate(&src, &dst, &Truncation::new("/obs", "time", 3), FormatOptions::default()).unwrap();

    let out = Dataset::open(&dst, false).unwrap();
    let root = out.root();
    assert_eq!(root.dimension("time").unwrap().len(), 7);
    assert_eq!(root.dimension("station").unwrap().len(), 2);
    let count = root.read("obs/count").unwrap();
    assert_eq!(count.as_real().unwrap().to_vec::<i32>().unwrap(), (1..=7).collect::<Vec<_>>());
    assert_eq!(root.read("obs/qc/flag").unwrap().shape().sizes(), &[7]);
    // Variables over other dimensions come through whole.
    let offset = root.read("meta/offset").unwrap();
    assert_eq!(offset.shape().sizes(), &[2]);
    assert_eq!(offset.as_real().unwrap().to_vec::<f64>().unwrap(), vec![0.5, -0.5]);
    out.close().unwrap();

    let err = truncate(&src, dir.path().join("none.nct"), &Truncation::new("/", "time", 11), FormatOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTruncation(_)));
    assert!(!dir.path().join("none.nct").exists());

    // Dropping everything leaves an empty growable axis.
    let empty = dir.path().join("empty.nct");
    truncate(&src, &empty, &Truncation::new("", "time", 10), FormatOptions::default()).unwrap();
    let out = Dataset::open(&empty, false).unwrap();
    assert_eq!(out.root().dimension("time").unwrap().len(), 0);
    out.close().unwrap();
}

// ============================================================================
// Partial write failures
// ============================================================================

/// Backend that fails array reads in one group once armed.
struct FlakyBackend {
    inner: MemoryBackend,
    failing: Arc<Mutex<Option<GroupId>>>,
}

impl StorageBackend for FlakyBackend {
    fn path(&self) -> Option<&Path> {
        self.inner.path()
    }
    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }
    fn root(&self) -> GroupId {
        self.inner.root()
    }
    fn define_dimension(&mut self, group: GroupId, name: &str, length: DimLength) -> Result<DimId> {
        self.inner.define_dimension(group, name, length)
    }
    fn define_variable(&mut self, group: GroupId, name: &str, scalar_type: ScalarType, dims: &[DimId]) -> Result<VarId> {
        self.inner.define_variable(group, name, scalar_type, dims)
    }
    fn define_group(&mut self, parent: GroupId, name: &str) -> Result<GroupId> {
        self.inner.define_group(parent, name)
    }
    fn end_define(&mut self) -> Result<()> {
        self.inner.end_define()
    }
    fn get_attribute(&self, group: GroupId, target: AttrTarget, name: &str) -> Result<Option<AttrValue>> {
        self.inner.get_attribute(group, target, name)
    }
    fn put_attribute(&mut self, group: GroupId, target: AttrTarget, name: &str, value: &AttrValue) -> Result<()> {
        self.inner.put_attribute(group, target, name, value)
    }
    fn attribute_names(&self, group: GroupId, target: AttrTarget) -> Result<Vec<String>> {
        self.inner.attribute_names(group, target)
    }
    fn read_array(&self, group: GroupId, var: VarId) -> Result<ArrayData> {
        if *self.failing.lock() == Some(group) {
            return Err(Error::Backend("simulated read failure".to_string()));
        }
        self.inner.read_array(group, var)
    }
    fn read_array_slice(&self, group: GroupId, var: VarId, axis: usize, position: usize) -> Result<ArrayData> {
        self.inner.read_array_slice(group, var, axis, position)
    }
    fn write_array(&mut self, group: GroupId, var: VarId, start: &[usize], count: &[usize], data: &ArrayData) -> Result<()> {
        self.inner.write_array(group, var, start, count, data)
    }
    fn dimension_length(&self, dim: DimId) -> Result<usize> {
        self.inner.dimension_length(dim)
    }
    fn inspect(&self, group: GroupId) -> Result<GroupListing> {
        self.inner.inspect(group)
    }
    fn sync(&mut self) -> Result<()> {
        self.inner.sync()
    }
    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[test]
fn test_write_failure_reports_incomplete_copy() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src.nct");
    write_source(&src);

    let failing = Arc::new(Mutex::new(None));
    let backend = FlakyBackend {
        inner: MemoryBackend::open(&src, false).unwrap(),
        failing: failing.clone(),
    };
    let source = Dataset::from_backend(Box::new(backend)).unwrap();
    let obs = source.root().group("obs").unwrap();
    *failing.lock() = Some(obs.id());

    let dest = Dataset::in_memory().unwrap();
    let err = Duplicator::new(source.root(), &DuplicateOptions::new())
        .unwrap()
        .copy_into(dest.root())
        .unwrap_err();

    match err {
        Error::IncompleteCopy { failed, first } => {
            // The first variable of /obs fails and the rest of its subtree is skipped.
            assert_eq!(failed, vec!["/obs/temp".to_string()]);
            assert!(matches!(*first, Error::Backend(_)));
        }
        other => panic!("expected IncompleteCopy, got {:?}", other),
    }

    // Definitions all landed; the sibling subtree was still written.
    let copy = dest.root();
    assert!(copy.has_variable("/obs/qc/flag"));
    assert!(copy.has_group("/meta"));
    assert_eq!(
        copy.group("meta").unwrap().attribute("note").and_then(|v| v.as_str().map(str::to_string)).as_deref(),
        Some("no data here")
    );
    let offset = copy.read("meta/offset").unwrap();
    assert_eq!(offset.as_real().unwrap().to_vec::<f64>().unwrap(), vec![0.5, -0.5]);
}
