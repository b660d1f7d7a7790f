mod common;

use common::*;
use quantools::{
    dataset::Manifest,
    metrics::{compute_statistics, value_and_uncertainty},
    plot::{
        DEFAULT_SIZE, render_svg,
        histograms::{Histogram2dOptions, HistogramOptions, plot_2d_histogram, plot_parameter},
        slice::{LabelOverlayContainer, LabeledSliceDisplay},
        values::{GroupingOptions, ValuePlotOptions, plot_grouping, plot_t1_single},
    },
    segmentation::{Parameter, SortOrder},
    unit::Unit,
};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn test_manifest_to_statistics() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "");

    let manifest = Manifest::from_path(&dir.path().join("dataset.toml")).unwrap();
    let dataset = manifest.load().unwrap();
    let names: Vec<_> = dataset.masks.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["lesion", "white matter", "grey matter"]);

    let segmentation = dataset.segmentation().unwrap();
    let order: Vec<_> = segmentation.iter().map(|t| t.name()).collect();
    assert_eq!(order, ["grey matter", "white matter", "lesion"]);

    let report = compute_statistics(&segmentation).unwrap();
    let wm = report.get("white matter").unwrap();
    assert_eq!(wm.volume, 3);
    let (mean, stdev) = value_and_uncertainty(wm, Parameter::T1).unwrap();
    assert!(close(mean, 1.1));
    assert!(close(stdev, 0.1));
    let lesion = report.get("lesion").unwrap();
    assert!(close(lesion.get(Parameter::T2).unwrap().max, 0.4));

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["grey matter"]["volume"], 3);
}

#[test]
fn test_manifest_options() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "unit = \"milliseconds\"\nsort = \"none\"\n");

    let dataset = Manifest::from_path(&dir.path().join("dataset.toml"))
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(dataset.sort, SortOrder::None);
    let segmentation = dataset.segmentation().unwrap();
    let order: Vec<_> = segmentation.iter().map(|t| t.name()).collect();
    assert_eq!(order, ["lesion", "white matter", "grey matter"]);

    let lesion = segmentation.by_name("lesion").unwrap();
    assert_eq!(lesion.parameter(Parameter::T1).unit, Unit::Milliseconds);
    assert_eq!(lesion.parameter(Parameter::M0).unit, Unit::None);
}

#[test]
fn test_plots_to_files() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "");
    let dataset = Manifest::from_path(&dir.path().join("dataset.toml"))
        .unwrap()
        .load()
        .unwrap();
    let segmentation = dataset.segmentation().unwrap();
    let report = compute_statistics(&segmentation).unwrap();
    let out = dir.path().join("plots");
    std::fs::create_dir_all(&out).unwrap();

    let histogram = out.join("t2.svg");
    render_svg(&histogram, DEFAULT_SIZE, |area| {
        plot_parameter(area, &segmentation, &HistogramOptions::default())
    })
    .unwrap();

    let lesion = segmentation.by_name("lesion").unwrap();
    render_svg(&out.join("lesion.svg"), DEFAULT_SIZE, |area| {
        plot_2d_histogram(area, lesion, &Histogram2dOptions::default())
    })
    .unwrap();

    render_svg(&out.join("t1.svg"), DEFAULT_SIZE, |area| {
        plot_t1_single(area, &report, &ValuePlotOptions::default())
    })
    .unwrap();

    let grouping = GroupingOptions {
        postfix: " (S1)".into(),
        ..Default::default()
    };
    render_svg(&out.join("grouping.svg"), DEFAULT_SIZE, |area| {
        plot_grouping(area, &report, &grouping)
    })
    .unwrap();

    let overlays = dataset
        .masks
        .iter()
        .map(|(name, mask)| (name.clone(), mask.map(|&b| f64::from(u8::from(b)))));
    let labels = LabelOverlayContainer::from_labels(overlays, None, None).unwrap();
    let background = dataset.maps.get(Parameter::T1).clone();
    let mut display = LabeledSliceDisplay::new(background, labels).unwrap();
    display.set_axis(1).unwrap();
    display.set_index(1).unwrap();
    render_svg(&out.join("slice.svg"), DEFAULT_SIZE, |area| display.render(area)).unwrap();

    let text = std::fs::read_to_string(&histogram).unwrap();
    assert!(text.contains("white matter ⟨T₂⟩"));
    let grouping = std::fs::read_to_string(out.join("grouping.svg")).unwrap();
    assert!(grouping.contains("lesion (S1)"));
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 5);
}

#[test]
fn test_missing_source_fails() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "");
    std::fs::remove_file(dir.path().join("labels.nrrd")).unwrap();
    let manifest = Manifest::from_path(&dir.path().join("dataset.toml")).unwrap();
    assert!(manifest.load().is_err());
}
