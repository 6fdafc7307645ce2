use frcnn::{iou, AnchorConfig, AnchorGenerator, ImageInfo, Proposal, ProposalConfig, ProposalGenerator};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_inputs(n: usize, seed: u64) -> (Array1<f32>, Array2<f32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let scores = Array1::from_shape_fn(n, |_| rng.random_range(0.0f32..1.0));
    let deltas = Array2::from_shape_fn((n, 4), |_| rng.random_range(-0.3f32..0.3));
    (scores, deltas)
}

#[test]
fn output_has_post_topk_entries_without_overlaps() {
    let gen = AnchorGenerator::new(&AnchorConfig::default()).unwrap();
    let anchors = gen.generate(20, 25);
    let (scores, deltas) = random_inputs(anchors.len(), 3);
    let info = ImageInfo::new(320.0, 400.0, 1.0).unwrap();
    let cfg = ProposalConfig {
        pre_nms_topk: 1000,
        post_nms_topk: 120,
        ..ProposalConfig::default()
    };
    let proposals = ProposalGenerator::new(cfg.clone())
        .unwrap()
        .generate(scores.view(), deltas.view(), &anchors, &info)
        .unwrap();
    assert_eq!(proposals.len(), cfg.post_nms_topk);

    let real: Vec<&Proposal> = proposals.iter().filter(|p| !p.is_padding()).collect();
    for pair in real.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for (i, a) in real.iter().enumerate() {
        assert!(a.bbox.x2 <= 399.0 && a.bbox.y2 <= 319.0);
        assert!(a.bbox.width() >= cfg.min_size && a.bbox.height() >= cfg.min_size);
        for b in &real[i + 1..] {
            assert!(iou(&a.bbox, &b.bbox) <= cfg.nms_thresh);
        }
    }
}

#[test]
fn no_survivors_yields_all_padding() {
    let gen = AnchorGenerator::new(&AnchorConfig::default()).unwrap();
    let anchors = gen.generate(2, 2);
    let scores = Array1::from_elem(anchors.len(), f32::NAN);
    let deltas = Array2::<f32>::zeros((anchors.len(), 4));
    let info = ImageInfo::new(32.0, 32.0, 1.0).unwrap();
    let proposals = ProposalGenerator::new(ProposalConfig {
        post_nms_topk: 7,
        ..ProposalConfig::default()
    })
    .unwrap()
    .generate(scores.view(), deltas.view(), &anchors, &info)
    .unwrap();
    assert_eq!(proposals, vec![Proposal::padding(); 7]);
}

#[test]
fn equal_scores_keep_anchor_order() {
    let gen = AnchorGenerator::new(&AnchorConfig {
        stride: 16,
        scales: vec![2.0],
        ratios: vec![1.0],
    })
    .unwrap();
    let anchors = gen.generate(4, 4);
    let scores = Array1::from_elem(anchors.len(), 0.5f32);
    let deltas = Array2::<f32>::zeros((anchors.len(), 4));
    let info = ImageInfo::new(64.0, 64.0, 1.0).unwrap();
    let proposals = ProposalGenerator::new(ProposalConfig {
        post_nms_topk: 16,
        nms_thresh: 0.99,
        min_size: 1.0,
        ..ProposalConfig::default()
    })
    .unwrap()
    .generate(scores.view(), deltas.view(), &anchors, &info)
    .unwrap();
    let order: Vec<usize> = proposals.iter().filter_map(|p| p.anchor).collect();
    let mut sorted = order.clone();
    sorted.sort_unstable();
    assert_eq!(order, sorted);
}

#[test]
fn rejects_bad_config_at_setup() {
    let err = ProposalGenerator::new(ProposalConfig {
        post_nms_topk: 0,
        ..ProposalConfig::default()
    })
    .err()
    .unwrap();
    assert_eq!(
        err,
        frcnn::FrcnnError::InvalidConfig {
            field: "proposal.post_nms_topk",
            reason: "must be > 0",
        }
    );
}
