use frcnn::{BBox, Detection, DetectorConfig, ImageInfo, RcnnDetector};
use ndarray::{array, Array2};

fn info() -> ImageInfo {
    ImageInfo::new(200.0, 200.0, 1.0).unwrap()
}

#[test]
fn identical_boxes_keep_the_higher_score() {
    let det = RcnnDetector::new(DetectorConfig {
        num_classes: 2,
        ..DetectorConfig::default()
    })
    .unwrap();
    let b = BBox::new(30.0, 30.0, 90.0, 90.0);
    let prob = array![[0.2f32, 0.8], [0.1, 0.9]];
    let pred = Array2::<f32>::zeros((2, 8));
    let out = det.detect(&[b, b], prob.view(), pred.view(), &info()).unwrap();
    let kept = out.compact();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].score, 0.9);
    assert_eq!(kept[0].bbox, b);
    assert_eq!(out.entries[1], Detection::sentinel());
}

#[test]
fn output_layout_is_fixed() {
    let det = RcnnDetector::new(DetectorConfig {
        num_classes: 4,
        ..DetectorConfig::default()
    })
    .unwrap();
    let rois = vec![
        BBox::new(10.0, 10.0, 40.0, 40.0),
        BBox::new(100.0, 100.0, 150.0, 150.0),
        BBox::new(12.0, 12.0, 40.0, 40.0),
    ];
    let prob = array![
        [0.1f32, 0.6, 0.2, 0.1],
        [0.1, 0.7, 0.1, 0.1],
        [0.1, 0.5, 0.3, 0.1],
    ];
    let pred = Array2::<f32>::zeros((3, 16));
    let out = det.detect(&rois, prob.view(), pred.view(), &info()).unwrap();
    assert_eq!(out.len(), 3 * 3);
    assert_eq!(out.slots_per_class, 3);

    let class1: Vec<f32> = out.entries[..3].iter().map(|d| d.score).collect();
    // roi 2 overlaps roi 0 heavily and is suppressed within class 1.
    assert_eq!(class1, vec![0.7, 0.6, -1.0]);
    let class2: Vec<f32> = out.entries[3..6].iter().map(|d| d.score).collect();
    assert_eq!(class2, vec![0.3, 0.1, -1.0]);
    assert!(out.entries[3..6].iter().take(2).all(|d| d.class_id == 2));

    let arr = out.to_array();
    assert_eq!(arr.dim(), (9, 6));
    assert_eq!(arr[[0, 0]], 1.0);
    assert_eq!(arr[[2, 1]], -1.0);
}

#[test]
fn topk_limits_candidates_per_class() {
    let det = RcnnDetector::new(DetectorConfig {
        num_classes: 2,
        nms_topk: Some(1),
        ..DetectorConfig::default()
    })
    .unwrap();
    let rois = vec![BBox::new(0.0, 0.0, 20.0, 20.0), BBox::new(100.0, 100.0, 120.0, 120.0)];
    let prob = array![[0.5f32, 0.5], [0.4, 0.6]];
    let pred = Array2::<f32>::zeros((2, 8));
    let out = det.detect(&rois, prob.view(), pred.view(), &info()).unwrap();
    let kept = out.compact();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].bbox, rois[1]);
}

#[test]
fn logits_go_through_softmax() {
    let det = RcnnDetector::new(DetectorConfig {
        num_classes: 2,
        ..DetectorConfig::default()
    })
    .unwrap();
    let rois = vec![BBox::new(0.0, 0.0, 20.0, 20.0)];
    let logits = array![[0.0f32, 0.0]];
    let pred = Array2::<f32>::zeros((1, 8));
    let out = det.detect_logits(&rois, logits.view(), pred.view(), &info()).unwrap();
    assert!((out.entries[0].score - 0.5).abs() < 1e-6);
}
