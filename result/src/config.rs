//! Configuration for result validation.

pub struct Config {
    /// Panic on the first divergence instead of collecting them.
    pub panic: bool,
    /// Log every divergence as it is found.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            panic: false,
            verbose: true,
        }
    }
}

/// Record a divergence if `$left != $right`. Evaluates to whether the
/// values matched.
macro_rules! compare {
    ($c:expr, $out:expr, $side:expr, $check:expr, $left:expr, $right:expr $(,)?) => {{
        if $left != $right {
            let divergence = fork_harness_error::Divergence::new(
                $side,
                $check,
                format!("{:?}", $left),
                format!("{:?}", $right),
            );
            $crate::config::record($c, $out, divergence);
            false
        } else {
            true
        }
    }};
}

/// Record an unconditional divergence on `$check`, with `$expected` and a
/// formatted actual value.
macro_rules! throw {
    ($c:expr, $out:expr, $side:expr, $check:expr, $expected:expr, $($arg:tt)+) => {{
        let divergence = fork_harness_error::Divergence::new(
            $side,
            $check,
            $expected,
            format!($($arg)+),
        );
        $crate::config::record($c, $out, divergence);
        false
    }};
}

pub(crate) fn record(
    config: &Config,
    out: &mut Vec<fork_harness_error::Divergence>,
    divergence: fork_harness_error::Divergence,
) {
    if config.panic {
        panic!("{}", divergence);
    }
    if config.verbose {
        log::warn!("{}", divergence);
    }
    out.push(divergence);
}

pub(crate) use {compare, throw};
