use std::env;
use std::str::FromStr;

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Returns the value of the named environment variable, treating an
/// empty value the same as an unset one.
pub fn get_optional_variable(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Parses the named environment variable, falling back to `default`
/// when it's unset or doesn't parse.
pub fn get_parsed_variable<T: FromStr>(name: &str, default: T) -> T {
    get_optional_variable(name)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
