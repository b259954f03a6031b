//! Property tests for box constraints.

use plnopt_core::prelude::*;
use proptest::collection::vec;
use proptest::prelude::*;

fn box_and_point() -> impl Strategy<Value = (BoxConstraints, Vector, Vector)> {
    (1usize..8).prop_flat_map(|n| {
        (
            vec(-10.0f64..10.0, n),
            vec(-10.0f64..10.0, n),
            vec(-20.0f64..20.0, n),
            vec(-5.0f64..5.0, n),
        )
            .prop_map(|(a, b, x, d)| {
                let lower = Vector::from_iterator(a.len(), a.iter().zip(&b).map(|(a, b)| a.min(*b)));
                let upper = Vector::from_iterator(a.len(), a.iter().zip(&b).map(|(a, b)| a.max(*b)));
                (
                    BoxConstraints::new(lower, upper).unwrap(),
                    Vector::from_vec(x),
                    Vector::from_vec(d),
                )
            })
    })
}

proptest! {
    #[test]
    fn prop_projection_is_feasible_and_idempotent((bounds, x, _d) in box_and_point()) {
        let projected = bounds.project(&x);
        prop_assert!(bounds.contains(&projected));
        prop_assert_eq!(bounds.project(&projected), projected);
    }

    #[test]
    fn prop_advance_stays_in_the_box(
        (bounds, x, d) in box_and_point(),
        alpha in 0.0f64..10.0,
    ) {
        let start = bounds.project(&x);
        prop_assert!(bounds.contains(&bounds.advance(&start, &d, alpha)));
    }

    #[test]
    fn prop_masked_direction_is_feasible((bounds, x, d) in box_and_point()) {
        let start = bounds.project(&x);
        let mut direction = d.clone();
        bounds.mask_direction(&start, &mut direction);
        let step = bounds.max_step(&start, &direction);
        prop_assert!(step >= 0.0);
        if step.is_finite() {
            let end = &start + &direction * step;
            for i in 0..end.len() {
                prop_assert!(end[i] >= bounds.lower()[i] - 1e-9);
                prop_assert!(end[i] <= bounds.upper()[i] + 1e-9);
            }
        }
    }

    #[test]
    fn prop_projected_gradient_vanishes_at_the_box_minimizer((bounds, x, _d) in box_and_point()) {
        // f(y) = ½‖y − x‖² is minimized over the box at P(x)
        let minimizer = bounds.project(&x);
        let gradient = &minimizer - &x;
        let pg = bounds.projected_gradient(&minimizer, &gradient);
        prop_assert!(pg.iter().all(|g| g.abs() < 1e-12));
    }
}
