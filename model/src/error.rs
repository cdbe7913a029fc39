use snafu::Snafu;

#[derive(Debug, Snafu)]
pub struct Error(OpaqueError);
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum OpaqueError {
    #[snafu(display("Error serializing {}: {}", what, source))]
    JsonSerialization {
        what: String,
        source: serde_json::Error,
    },

    #[snafu(display("Error serializing {} to yaml: {}", what, source))]
    YamlSerialization {
        what: String,
        source: serde_yaml::Error,
    },

    #[snafu(display("Invalid {} name '{}', expected '{}'", kind, name, expected))]
    InvalidName {
        kind: String,
        name: String,
        expected: String,
    },
}
