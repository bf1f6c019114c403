use std::path::PathBuf;

use ap_fields::{ColumnSource, MovingMeshGas};
use ap_profile::{BinScale, ProfileRequest, create_profile};
use ap_viz::{PhasePlot, PhasePlotOptions, PlotState, ProfilePlot, ProfilePlotOptions};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures").join(name)
}

fn load_gas() -> ColumnSource {
    let mut src = ColumnSource::from_path(fixture_path("gas_cells.json")).expect("load fixture");
    MovingMeshGas::default().register(src.registry_mut()).expect("register preset");
    src
}

#[test]
fn profile_plot_artifact_contract() {
    let src = load_gas();
    let opts = ProfilePlotOptions::default().n_bins(8);
    let mut plot =
        ProfilePlot::new(&src, "radius", ["density", "temperature", "H_p0_fraction"], opts)
            .expect("profile plot");
    let artifact = plot.artifact().expect("artifact");

    let json = serde_json::to_value(&artifact).expect("serialize");
    assert_eq!(json["schema_version"], "astroprof_profile_plot_v1");
    assert_eq!(json["meta"]["tool"], "astroprof");
    assert_eq!(json["panels"].as_array().map(Vec::len), Some(3));

    let density = artifact.panels.iter().find(|p| p.field == "density").expect("density panel");
    assert_eq!(density.x_title, "radius (kpc)");
    assert_eq!(density.y_title, "density (g/cm**3)");
    assert_eq!(density.y_scale, BinScale::Log);
    assert_eq!(density.series.len(), 1);
    assert_eq!(density.series[0].x.len(), 8);
    assert!(density.series[0].y.windows(2).all(|w| w[0] > w[1]));

    let temperature = artifact.panels.iter().find(|p| p.field == "temperature").unwrap();
    assert_eq!(temperature.y_title, "temperature (K)");
}

#[test]
fn overplotted_profiles_share_panels() {
    let src = load_gas();
    let inner = ProfileRequest::new(["radius"], ["cell_mass"]).n_bins(4).range("radius", 0.0, 0.5);
    let outer = ProfileRequest::new(["radius"], ["cell_mass"]).n_bins(4).range("radius", 0.5, 1.0);
    let profiles =
        vec![create_profile(&src, &inner).unwrap(), create_profile(&src, &outer).unwrap()];

    let labels = Some(vec!["inner".into(), "outer".into()]);
    let mut plot = ProfilePlot::from_profiles(profiles, labels, None).expect("from profiles");
    plot.set_line_property("linestyle", "--", None).unwrap();
    assert_eq!(plot.state(), PlotState::Invalid);

    let artifact = plot.artifact().unwrap();
    assert_eq!(artifact.panels.len(), 1);
    let series = &artifact.panels[0].series;
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].x[0], 0.0);
    assert_eq!(series[1].x[0], 0.5);
    assert!(series.iter().all(|s| s.style.get("linestyle").is_some()));
}

#[test]
fn phase_plot_artifact_contract() {
    let src = load_gas();
    let opts = PhasePlotOptions::default().bins(6, 5);
    let mut plot = PhasePlot::new(&src, "density", "temperature", ["H_number_density"], opts)
        .expect("phase plot");
    plot.set_cmap("H_number_density", "dusk").unwrap();
    let artifact = plot.artifact().unwrap();

    assert_eq!(artifact.x_edges.len(), 7);
    assert_eq!(artifact.y_edges.len(), 6);
    assert_eq!(artifact.x_scale, BinScale::Log);
    assert_eq!(artifact.used.len(), 6);
    let panel = &artifact.panels[0];
    assert_eq!(panel.cmap, "dusk");
    assert_eq!(panel.norm, "log10");
    let [lo, hi] = panel.z_range.expect("z range");
    assert!(lo > 0.0 && lo <= hi);
}

#[test]
fn aliased_fields_are_titled_by_requested_name() {
    let src = load_gas();
    let opts = PhasePlotOptions::default().bins(4, 4);
    let mut plot =
        PhasePlot::new(&src, "density", "temperature", ["cell_mass"], opts).expect("phase plot");
    let artifact = plot.artifact().unwrap();
    assert_eq!(artifact.x_title, "density (g/cm**3)");
    assert_eq!(artifact.y_title, "temperature (K)");
    assert_eq!(artifact.panels[0].title, "cell_mass (Msun)");

    let info = ap_viz::requested_field_info(&src, "density").expect("density info");
    assert_eq!(info.name, "density");
    assert_eq!(info.units, "g/cm**3");
    assert!(ap_viz::requested_field_info(&src, "nope").is_none());
}
