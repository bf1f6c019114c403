use ap_core::{DataSource, Error};
use ap_fields::{ColumnSource, MovingMeshGas};
use ap_profile::{BinScale, ProfileRequest, create_profile};
use approx::assert_relative_eq;

fn gas_cells(n: usize) -> ColumnSource {
    let mut src = ColumnSource::new();
    let radius: Vec<f64> = (0..n).map(|i| (i as f64 + 0.5) / n as f64).collect();
    let density: Vec<f64> = radius.iter().map(|r| 10f64.powf(-2.0 * r)).collect();
    let energy: Vec<f64> = radius.iter().map(|r| 1.0 + r).collect();
    let mass: Vec<f64> = (0..n).map(|i| 1.0 + (i % 3) as f64).collect();
    src.insert("radius", radius).unwrap();
    src.insert("Density", density).unwrap();
    src.insert("InternalEnergy", energy).unwrap();
    src.insert("cell_mass", mass).unwrap();
    src
}

#[test]
fn profile_of_derived_field() {
    let mut src = gas_cells(1000);
    MovingMeshGas::default().register(src.registry_mut()).unwrap();
    assert!(src.has_field("pressure"));

    let req = ProfileRequest::new(["radius"], ["pressure", "density"])
        .n_bins(10)
        .range("radius", 0.0, 1.0)
        .weight("cell_mass");
    let prof = create_profile(&src, &req).unwrap();

    assert_eq!(prof.field_names().collect::<Vec<_>>(), vec!["pressure", "density"]);
    assert_eq!(prof.counts().iter().sum::<u64>(), 1000);
    let p = prof.field("pressure").unwrap();
    let d = prof.field("density").unwrap();
    // pressure falls with radius because density does.
    assert!(p.windows(2).all(|w| w[0] > w[1]));
    assert!(d.windows(2).all(|w| w[0] > w[1]));
}

#[test]
fn log_axis_from_field_metadata() {
    let mut src = gas_cells(200);
    MovingMeshGas::default().register(src.registry_mut()).unwrap();

    // `pressure` is registered with take_log, so Auto picks a log axis.
    let req = ProfileRequest::new(["pressure"], ["cell_mass"]).n_bins(8);
    let prof = create_profile(&src, &req).unwrap();
    assert_eq!(prof.axes()[0].scale(), BinScale::Log);
    assert_eq!(prof.dropped(), 0);
    assert_eq!(prof.weight_field(), None);

    let total: f64 = src.field("cell_mass").unwrap().iter().sum();
    assert_relative_eq!(prof.field("cell_mass").unwrap().iter().sum::<f64>(), total);
}

#[test]
fn phase_profile_with_accumulation() {
    let src = gas_cells(400);
    let req = ProfileRequest::new(["radius", "InternalEnergy"], ["cell_mass"])
        .n_bins_per_axis(vec![4, 5])
        .accumulate_axes(vec![true, true]);
    let prof = create_profile(&src, &req).unwrap();
    assert_eq!(prof.shape(), vec![4, 5]);
    let m = prof.field("cell_mass").unwrap();
    let total: f64 = src.field("cell_mass").unwrap().iter().sum();
    assert_relative_eq!(m[m.len() - 1], total, max_relative = 1e-12);
    assert_eq!(prof.accumulated(), &[true, true]);
}

#[test]
fn unknown_field_is_reported() {
    let src = gas_cells(10);
    let err = create_profile(&src, &ProfileRequest::new(["radius"], ["pressure"])).unwrap_err();
    assert!(matches!(err, Error::FieldNotFound(_)));
}

#[test]
fn request_from_json() {
    let src = gas_cells(100);
    let req: ProfileRequest = serde_json::from_str(
        r#"{"bin_fields": ["radius"], "fields": ["cell_mass"], "n_bins": 4,
            "ranges": {"radius": [0.0, 1.0]}, "chunk_size": 16}"#,
    )
    .unwrap();
    let prof = create_profile(&src, &req).unwrap();
    assert_eq!(prof.bin_edges(0), &[0.0, 0.25, 0.5, 0.75, 1.0]);
    assert_eq!(prof.counts(), &[25, 25, 25, 25]);
}
