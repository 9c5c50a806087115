//! Integration tests for the mixture density view: evaluation and sampling

use kolosal_mixture::mixture::{CovarianceSpec, FitConfig, GaussianMixture, GaussianMixtureDensity};
use kolosal_mixture::MixtureError;
use ndarray::{array, Array1, Array2, Array3, Axis};

fn two_component_view(seed: u64) -> GaussianMixtureDensity {
    GaussianMixtureDensity::new(array![[0.0], [10.0]], CovarianceSpec::Identity, None, Some(seed))
        .unwrap()
}

#[test]
fn test_sample_proportions_and_means() {
    let view = two_component_view(42);
    let (x, components) = view.sample_with_components(10_000).unwrap();
    assert_eq!(x.dim(), (10_000, 1));

    let n_first = components.iter().filter(|&&c| c == 0).count() as f64;
    assert!((n_first / 10_000.0 - 0.5).abs() < 0.05);

    for j in 0..2 {
        let drawn: Vec<f64> = x
            .column(0)
            .iter()
            .zip(components.iter())
            .filter(|(_, &c)| c == j)
            .map(|(&v, _)| v)
            .collect();
        let mean = drawn.iter().sum::<f64>() / drawn.len() as f64;
        let var = drawn.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / drawn.len() as f64;
        assert!((mean - 10.0 * j as f64).abs() < 0.1, "component {}: {}", j, mean);
        assert!((var - 1.0).abs() < 0.1, "component {}: {}", j, var);
    }
}

#[test]
fn test_weighted_sampling() {
    let view = GaussianMixtureDensity::new(
        array![[0.0], [10.0]],
        CovarianceSpec::Identity,
        Some(array![1.0, 3.0]),
        Some(3),
    )
    .unwrap();
    assert_eq!(view.weights(), &array![0.25, 0.75]);

    let (_, components) = view.sample_with_components(8_000).unwrap();
    let share = components.iter().filter(|&&c| c == 1).count() as f64 / 8_000.0;
    assert!((share - 0.75).abs() < 0.03);
}

#[test]
fn test_correlated_sampling() {
    let cov = array![[2.0, 1.2], [1.2, 1.0]];
    let view = GaussianMixtureDensity::new(
        array![[1.0, -1.0]],
        CovarianceSpec::Shared(cov.clone()),
        None,
        Some(8),
    )
    .unwrap();

    let x = view.sample(20_000).unwrap();
    let mean = x.mean_axis(Axis(0)).unwrap();
    assert!((mean[0] - 1.0).abs() < 0.05);
    assert!((mean[1] + 1.0).abs() < 0.05);

    let centered = &x - &mean;
    let empirical = centered.t().dot(&centered) / (x.nrows() - 1) as f64;
    for (got, want) in empirical.iter().zip(cov.iter()) {
        assert!((got - want).abs() < 0.1, "{}", empirical);
    }
}

#[test]
fn test_sampling_is_seeded() {
    let a = two_component_view(5).sample(50).unwrap();
    let b = two_component_view(5).sample(50).unwrap();
    let c = two_component_view(6).sample(50).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_sample_rejects_zero_draws() {
    let view = two_component_view(0);
    assert!(matches!(view.sample(0), Err(MixtureError::InvalidParameter { .. })));
}

#[test]
fn test_evaluate_matches_weighted_normals() {
    let view = two_component_view(0);
    let x = array![[0.0], [5.0], [10.0]];
    let density = view.evaluate(&x).unwrap();

    let phi = |z: f64| (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt();
    for (i, &v) in x.column(0).iter().enumerate() {
        let expected = 0.5 * phi(v) + 0.5 * phi(v - 10.0);
        assert!((density[i] - expected).abs() < 1e-12);
    }

    assert!(matches!(
        view.evaluate(&array![[0.0, 1.0]]),
        Err(MixtureError::ShapeError { .. })
    ));
}

#[test]
fn test_covariance_shapes() {
    let means = array![[0.0, 0.0], [3.0, 3.0]];
    let specs = vec![
        CovarianceSpec::Identity,
        CovarianceSpec::Isotropic(2.0),
        CovarianceSpec::PerComponentIsotropic(array![1.0, 4.0]),
        CovarianceSpec::SharedDiagonal(array![1.0, 2.0]),
        CovarianceSpec::Shared(array![[1.0, 0.5], [0.5, 1.0]]),
        CovarianceSpec::Full(Array3::from_shape_fn((2, 2, 2), |(_, i, j)| {
            if i == j {
                1.5
            } else {
                0.0
            }
        })),
    ];
    for spec in specs {
        let view = GaussianMixtureDensity::new(means.clone(), spec.clone(), None, None).unwrap();
        assert_eq!(view.covs().dim(), (2, 2, 2), "{:?}", spec);
    }

    assert!(GaussianMixtureDensity::new(
        means.clone(),
        CovarianceSpec::PerComponentIsotropic(array![1.0, 2.0, 3.0]),
        None,
        None
    )
    .is_err());
    assert!(GaussianMixtureDensity::new(means, CovarianceSpec::Isotropic(-1.0), None, None).is_err());
}

#[test]
fn test_vector_means() {
    let view = GaussianMixtureDensity::from_vector_means(
        Array1::from(vec![-2.0, 0.0, 2.0]),
        CovarianceSpec::Isotropic(0.5),
        None,
        None,
    )
    .unwrap();
    assert_eq!((view.k(), view.p()), (3, 1));
    assert_eq!(view.means(), &array![[-2.0], [0.0], [2.0]]);
}

#[test]
fn test_invalid_weights() {
    let means = array![[0.0], [1.0]];
    assert!(GaussianMixtureDensity::new(
        means.clone(),
        CovarianceSpec::Identity,
        Some(array![1.0, -1.0]),
        None
    )
    .is_err());
    assert!(GaussianMixtureDensity::new(means, CovarianceSpec::Identity, Some(array![1.0]), None).is_err());
}

#[test]
fn test_pdf_advances_model_generator() {
    let values: Vec<f64> = (0..60)
        .map(|i| if i % 2 == 0 { -4.0 } else { 4.0 } + (i as f64 * 0.37).sin())
        .collect();
    let x = Array2::from_shape_vec((60, 1), values).unwrap();
    let config = FitConfig::new().with_repeats(2).with_init_repeats(4);

    let mut gmm = GaussianMixture::new(2).unwrap().with_random_state(1);
    gmm.fit(&x, &config).unwrap();

    // Two views share one stream: consecutive draws differ
    let first = gmm.pdf().unwrap().sample(5).unwrap();
    let second = gmm.pdf().unwrap().sample(5).unwrap();
    assert_ne!(first, second);

    let view = gmm.pdf().unwrap();
    assert_eq!(view.k(), 2);
    assert_eq!(view.weights(), gmm.weights().unwrap());
}
