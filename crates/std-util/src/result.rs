/// Unwraps the `Err` of a result, panicking with the `Ok` value otherwise.
#[macro_export]
macro_rules! assert_err {
    ($e:expr $(,)?) => {
        match $e {
            Err(e) => e,
            Ok(actual) => panic!("expected `Err`; actual=Ok({:?})", actual),
        }
    };
    ($e:expr, $($msg:tt)+) => {
        match $e {
            Err(e) => e,
            Ok(actual) => panic!(
                "expected `Err`; actual=Ok({:?}), {}",
                actual,
                format_args!($($msg)+)
            ),
        }
    };
}

/// Unwraps the `Ok` of a result, panicking with the error otherwise.
#[macro_export]
macro_rules! assert_ok {
    ($e:expr $(,)?) => {
        match $e {
            Ok(v) => v,
            Err(err) => panic!("expected `Ok`; actual=Err({:?})", err),
        }
    };
}
