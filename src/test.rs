// tests that Clone, Debug, and PartialEq are implemented for a type
#[macro_export]
macro_rules! test_basic_impls {
    ($fx: expr) => {
        #[test]
        fn should_impl_debug_clone_and_partialeq() {
            assert_eq!($fx, $fx.clone());
            let _s1 = format!("{:?}", $fx);
        }
    };
}

// tests that the KL divergence of a prior with itself is zero
#[macro_export]
macro_rules! test_self_kl_is_zero {
    ($fx: expr) => {
        #[test]
        fn kl_div_with_itself_should_be_zero() {
            let p = $fx;
            assert::close(p.kl_div(&p.clone()), 0.0, 1E-10);
        }
    };
}

// tests that the closed-form gradient of the log-normalizer agrees with a
// central finite difference on the given coordinates
#[macro_export]
macro_rules! test_grad_lognorm {
    ($fx: expr) => {
        $crate::test_grad_lognorm!($fx, 0..$fx.natural_params().len());
    };
    ($fx: expr, $ixs: expr) => {
        #[test]
        fn grad_lognorm_should_match_finite_differences() {
            let p = $fx;
            let grad = p.grad_lognorm();
            let eta = p.natural_params().clone();
            let h = 1E-6;
            for i in $ixs {
                let mut up = eta.clone();
                up[i] += h;
                let mut down = eta.clone();
                down[i] -= h;
                let mut p_up = p.clone();
                let mut p_down = p.clone();
                if p_up.set_natural_params(up).is_err()
                    || p_down.set_natural_params(down).is_err()
                {
                    continue;
                }
                let fd = (p_up.log_norm() - p_down.log_norm()) / (2.0 * h);
                assert::close(grad[i], fd, 1E-4);
            }
        }
    };
}
