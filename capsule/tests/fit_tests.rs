use approx::assert_relative_eq;
use capsule::decay::DecayKernel;
use capsule::persist::LoadedFactors;
use capsule::predict::{PointPredict, Predictor};
use capsule::{Capsule, CapsuleData, CapsuleOptions, Corpus, ModelMode, Observation, Termination};
use matrix_util::common_io::{create_temp_dir, read_lines_of_types, write_lines};

fn obs(doc: usize, term: usize, count: u32) -> Observation {
    Observation { doc, term, count }
}

/// 2 entities, 3 dates, 4 terms, 5 documents
///
/// Entity 0 mostly writes about terms 0 and 1, entity 1 about terms 2
/// and 3; on date 1 both pick up term 3.
fn toy_corpus(test: Vec<Observation>) -> Corpus {
    let meta = vec![(0, 0), (1, 0), (0, 1), (1, 1), (0, 2)];
    let train = vec![
        obs(0, 0, 3),
        obs(0, 1, 2),
        obs(1, 2, 3),
        obs(1, 3, 1),
        obs(2, 0, 2),
        obs(2, 3, 2),
        obs(3, 2, 1),
        obs(3, 3, 4),
        obs(4, 0, 2),
        obs(4, 1, 3),
    ];
    let validation = vec![obs(0, 0, 3), obs(1, 2, 3), obs(3, 3, 4), obs(4, 1, 3)];
    Corpus::new(meta, train, validation, test).unwrap()
}

fn toy_options(outdir: &std::path::Path) -> CapsuleOptions {
    CapsuleOptions {
        outdir: outdir.to_str().unwrap().into(),
        k: 2,
        event_dur: 2,
        svi: false,
        max_iter: 50,
        min_iter: 50,
        conv_freq: 5,
        seed: 7,
        ..Default::default()
    }
}

#[test]
fn batch_fit_on_toy_corpus() -> anyhow::Result<()> {
    let dir = create_temp_dir()?;
    let data = toy_corpus(vec![]);
    assert_eq!(
        (data.entity_count(), data.date_count(), data.term_count()),
        (2, 3, 4)
    );

    let mut model = Capsule::new(toy_options(&dir), &data)?;
    let summary = model.learn()?;

    assert!(summary.iterations <= 50);
    assert_eq!(summary.termination, Termination::MaxIterations);
    assert_eq!(summary.dropped_observations, 0);

    for doc in 0..data.train_doc_count() {
        for term in 0..data.term_count() {
            let pred = model.predict(doc, term);
            assert!(pred >= 0.0, "doc {} term {}: {}", doc, term, pred);
        }
    }

    let ll: Vec<f64> = summary.checkpoints.iter().map(|&(_, x)| x).collect();
    assert_eq!(ll.len(), 10);
    // may dip once early, then climbs
    assert!(ll.last().unwrap() >= &ll[1], "{:?}", ll);
    let regressions = ll
        .windows(2)
        .filter(|w| w[1] < w[0] - 1e-3 * w[0].abs())
        .count();
    assert!(regressions <= 2, "{:?}", ll);

    for row in model.store().decay().events_seen_from(2) {
        assert!(model.store().event_strength(row) > 0.0);
    }

    let log = read_lines_of_types::<f64>(&format!("{}/log_likelihood.dat", dir.display()), -1)?;
    assert_eq!(log.lines.len(), 10);
    let time = read_lines_of_types::<f64>(&format!("{}/time_log.dat", dir.display()), -1)?;
    assert_eq!(time.lines.len(), 50);

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn every_mode_fits() -> anyhow::Result<()> {
    let data = toy_corpus(vec![]);
    for mode in [ModelMode::Full, ModelMode::EntityOnly, ModelMode::EventOnly] {
        let dir = create_temp_dir()?;
        let opts = CapsuleOptions {
            mode,
            max_iter: 10,
            min_iter: 1,
            ..toy_options(&dir)
        };
        let mut model = Capsule::new(opts, &data)?;
        let summary = model.learn()?;
        assert!(summary.log_likelihood.is_finite());

        let has_pi = dir.join("pi-final.dat").is_file();
        let has_theta = dir.join("theta-final.dat").is_file();
        assert_eq!(has_pi, mode.has_event_factors());
        assert_eq!(has_theta, mode.has_entity_factors());
        std::fs::remove_dir_all(&dir)?;
    }
    Ok(())
}

#[test]
fn early_stop_then_final_pass() -> anyhow::Result<()> {
    let dir = create_temp_dir()?;
    let data = toy_corpus(vec![]);
    let opts = CapsuleOptions {
        svi: true,
        sample_size: 3,
        delay: 1.0,
        forget: 0.9,
        min_iter: 5,
        max_iter: 200,
        likelihood_delta: 1e-2,
        final_pass: true,
        ..toy_options(&dir)
    };
    let mut model = Capsule::new(opts, &data)?;
    let summary = model.learn()?;

    let &(last_checkpoint, _) = summary.checkpoints.last().unwrap();
    assert_eq!(last_checkpoint, summary.iterations);
    // stopped on a checkpoint (or at max_iter = 200), then one batch pass
    assert_eq!(summary.iterations % 5, 1);
    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn loose_threshold_converges_then_final_pass() -> anyhow::Result<()> {
    let dir = create_temp_dir()?;
    let data = toy_corpus(vec![]);
    let opts = CapsuleOptions {
        min_iter: 5,
        likelihood_delta: 0.5,
        final_pass: true,
        ..toy_options(&dir)
    };
    let mut model = Capsule::new(opts, &data)?;
    let summary = model.learn()?;

    // iteration 5 moves away from -1e10; iteration 10 changes by far less than half
    assert_eq!(summary.termination, Termination::LikelihoodConverged);
    assert_eq!(summary.iterations, 11);
    let iters: Vec<usize> = summary.checkpoints.iter().map(|&(i, _)| i).collect();
    assert_eq!(iters, vec![5, 10, 11]);
    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn saved_snapshot_reproduces_predictions() -> anyhow::Result<()> {
    let dir = create_temp_dir()?;
    let data = toy_corpus(vec![]);
    let opts = CapsuleOptions {
        max_iter: 10,
        save_freq: 5,
        ..toy_options(&dir)
    };
    let mut model = Capsule::new(opts, &data)?;
    model.learn()?;

    // intermediate snapshots use zero-padded labels
    assert!(dir.join("phi-k-0005.dat").is_file());
    assert!(dir.join("event-strength-0005.dat").is_file());
    // the last iteration only writes the final snapshot
    assert!(!dir.join("phi-k-0010.dat").exists());

    let dims = (data.entity_count(), data.date_count(), data.term_count());
    let loaded = LoadedFactors::load(dir.to_str().unwrap(), "final", ModelMode::Full, dims)?;
    let decay = DecayKernel::new(data.date_count(), 2)?;
    let reloaded = Predictor::new(&loaded, &decay, ModelMode::Full, &data);

    for doc in 0..data.train_doc_count() {
        for term in 0..data.term_count() {
            assert_relative_eq!(
                reloaded.predict(doc, term),
                model.predict(doc, term),
                max_relative = 1e-5
            );
        }
    }
    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn fit_and_evaluate_from_files() -> anyhow::Result<()> {
    let data_dir = create_temp_dir()?;
    let data_path = data_dir.to_str().unwrap();

    write_lines(
        &["# doc entity date", "0\t0\t0", "1\t1\t0", "2\t0\t1", "3\t1\t1", "4\t0\t2"],
        &format!("{}/meta.tsv", data_path),
    )?;
    write_lines(
        &[
            "0 0 3", "0 1 2", "1 2 3", "1 3 1", "2 0 2", "2 3 2", "3 2 1", "3 3 4", "4 0 2",
        ],
        &format!("{}/train.tsv.gz", data_path),
    )?;
    write_lines(&["0 0 3", "3 3 4"], &format!("{}/validation.tsv", data_path))?;
    write_lines(&["4 1 3", "1 0 1", "2 1 1"], &format!("{}/test.tsv", data_path))?;

    let data = Corpus::from_dir(data_path)?;
    assert_eq!(data.train_doc_count(), 5);
    assert_eq!(data.doc_terms(4), &[(0, 2)]);
    assert_eq!(data.test().len(), 3);
    assert_eq!(data.num_validation(), 2);

    let out_dir = create_temp_dir()?;
    let opts = CapsuleOptions {
        max_iter: 10,
        eval_freq: 5,
        ..toy_options(&out_dir)
    };
    let mut model = Capsule::new(opts, &data)?;
    model.learn()?;
    let summary = model.evaluate("final")?.unwrap();

    assert_eq!(summary.num_docs, 3);
    assert!(summary.first >= 1.0);
    assert!(summary.ncrr > 0.0 && summary.ncrr <= 1.0 + 1e-12);
    assert!(summary.ndcg > 0.0 && summary.ndcg <= 1.0 + 1e-12);
    assert!(out_dir.join("eval-0005.dat").is_file());
    assert!(out_dir.join("eval-summary-final.dat").is_file());

    let rows = read_lines_of_types::<f64>(
        &format!("{}/eval-final.dat", out_dir.display()),
        -1,
    )?
    .lines;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().map(|r| r[0] as usize).collect::<Vec<_>>(), vec![1, 2, 4]);

    std::fs::remove_dir_all(&data_dir)?;
    std::fs::remove_dir_all(&out_dir)?;
    Ok(())
}
