//! Integration tests for writing datasets and verifying round-trip.

use nctree::prelude::*;
use nctree::Attributes;

use tempfile::tempdir;

fn doubles(shape: &[usize], values: impl IntoIterator<Item = f64>) -> ArrayData {
    ArrayData::from_vec(shape, values.into_iter().collect::<Vec<_>>()).expect("bad test array")
}

#[test]
fn test_roundtrip_hierarchy_and_data() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("obs.nct");

    // Write
    {
        let ds = Dataset::create(&path, FormatOptions::default()).expect("Failed to create dataset");
        let root = ds.root();
        root.set_attribute("title", "station observations").unwrap();
        root.add_dimension_with_data("lat", DimLength::Fixed(2), doubles(&[2], [10.5, 11.5]))
            .unwrap();
        root.add_dimension("time", DimLength::Growable).unwrap();

        let station = root.add_group("station").unwrap();
        station
            .add_variable_with_data("temperature", &["time", "lat"], doubles(&[3, 2], (0..6).map(|i| i as f64)))
            .unwrap();
        station
            .set_variable_attribute("temperature", "units", "K")
            .unwrap();
        ds.close().expect("Failed to close dataset");
    }

    // Read back and verify
    let ds = Dataset::open(&path, false).expect("Failed to open dataset");
    let root = ds.root();
    assert_eq!(root.attribute("title").and_then(|v| v.as_str().map(str::to_string)).as_deref(), Some("station observations"));
    assert_eq!(root.dimension("time").unwrap().len(), 3);
    assert_eq!(root.dimension("lat").unwrap().length(), DimLength::Fixed(2));

    let lat = root.read("lat").unwrap();
    assert_eq!(lat.as_real().unwrap().to_vec::<f64>().unwrap(), vec![10.5, 11.5]);

    let station = root.group("station").unwrap();
    let temp = station.variable("temperature").unwrap();
    assert_eq!(temp.dimension_names(), vec!["time", "lat"]);
    assert_eq!(temp.attributes().get("units").and_then(|v| v.as_str()), Some("K"));
    let data = root.read("station/temperature").unwrap();
    assert_eq!(
        data.as_real().unwrap().to_vec::<f64>().unwrap(),
        vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]
    );
    ds.close().unwrap();
}

#[test]
fn test_complex_pairing_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("waves.nct");
    {
        let ds = Dataset::create(&path, FormatOptions::compact()).unwrap();
        let root = ds.root();
        root.add_dimension("k", DimLength::Fixed(3)).unwrap();
        root.add_complex_variable_with_data(
            "w",
            &["k"],
            doubles(&[3], [1.0, 2.0, 3.0]),
            doubles(&[3], [-1.0, -2.0, -3.0]),
        )
        .unwrap();
        ds.close().unwrap();
    }

    let ds = Dataset::open(&path, false).unwrap();
    let root = ds.root();
    assert!(root.has_variable("w"));
    let w = root.variable("w").unwrap();
    assert!(w.is_complex());
    let complex = w.as_complex().unwrap();
    assert_eq!(complex.real_part().name(), "w.real");
    assert_eq!(complex.imag_part().name(), "w.imag");
    // The parts are not listed as variables of their own.
    assert_eq!(root.variables().len(), 1);

    match root.read("w").unwrap() {
        VariableData::Complex { re, im } => {
            assert_eq!(re.to_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);
            assert_eq!(im.to_vec::<f64>().unwrap(), vec![-1.0, -2.0, -3.0]);
        }
        other => panic!("expected complex data, got {:?}", other),
    }
    ds.close().unwrap();
}

#[test]
fn test_append_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("series.nct");
    {
        let ds = Dataset::create(&path, FormatOptions::compact()).unwrap();
        let root = ds.root();
        root.add_dimension("time", DimLength::Growable).unwrap();
        root.add_variable("t", ScalarType::Double, &["time"]).unwrap();
        root.append("t", doubles(&[2], [1.0, 2.0])).unwrap();
        ds.close().unwrap();
    }
    {
        let ds = Dataset::open(&path, true).unwrap();
        let root = ds.root();
        assert_eq!(root.dimension("time").unwrap().len(), 2);
        root.append("t", doubles(&[3], [3.0, 4.0, 5.0])).unwrap();
        assert_eq!(root.dimension("time").unwrap().len(), 5);
        ds.close().unwrap();
    }

    let ds = Dataset::open(&path, false).unwrap();
    let root = ds.root();
    let slice = root.read_slice(&["t"], "time", 4).unwrap();
    assert_eq!(slice[0].as_real().unwrap().to_vec::<f64>().unwrap(), vec![4.0]);
    let err = root.read_slice(&["t"], "time", 6).unwrap_err();
    assert!(matches!(err, Error::InvalidTruncation(_)));
    ds.close().unwrap();
}

#[test]
fn test_blob_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("blob.nct");
    let payload = b"\x00\x01binary\xff".to_vec();
    {
        let ds = Dataset::create(&path, FormatOptions::compact()).unwrap();
        ds.root().add_blob("config", &payload).unwrap();
        ds.close().unwrap();
    }
    let ds = Dataset::open(&path, false).unwrap();
    assert_eq!(ds.root().blob("config").unwrap(), payload);
    ds.close().unwrap();
}

#[test]
fn test_provenance_can_be_disabled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plain.nct");
    let ds = Dataset::create(&path, FormatOptions::compact()).unwrap();
    ds.close().unwrap();

    let ds = Dataset::open(&path, false).unwrap();
    assert!(ds.root().attribute(Attributes::PROVENANCE_KEY).is_none());
    ds.close().unwrap();
}

#[test]
fn test_dropped_handle_is_not_committed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dropped.nct");
    {
        let ds = Dataset::create(&path, FormatOptions::compact()).unwrap();
        ds.root().add_dimension("x", DimLength::Fixed(1)).unwrap();
    }
    assert!(!path.exists());
}

#[test]
fn test_open_missing_file() {
    let dir = tempdir().unwrap();
    let err = Dataset::open(dir.path().join("absent.nct"), false).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "got {:?}", err);
}
