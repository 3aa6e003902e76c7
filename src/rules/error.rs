#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "invalid matches for datasource `{datasource}`: expected a list of matches, got `{value}` (did you forget the brackets?)"
    )]
    ScalarMatches { datasource: String, value: String },
    #[error("invalid color `{color}` for datasource `{datasource}`: expected `#RRGGBB`")]
    InvalidColor { datasource: String, color: String },
    #[error("invalid match `{literal}` for datasource `{datasource}`: unbalanced quotes or trailing backslash")]
    InvalidLiteral { datasource: String, literal: String },
    #[error("datasource `{0}` cannot be passed to rrdtool: it contains a line break or both quote characters")]
    UnquotableDatasource(String),
    #[error("duplicate datasource `{0}`")]
    DuplicateDatasource(String),
    #[error("empty datasource name")]
    EmptyDatasource,
    #[error("rule id `{0}` is already in use")]
    DuplicateRuleId(String),
    #[error("invalid rule id `{0}`: must be non-empty and contain no whitespace")]
    InvalidRuleId(String),
    #[error("invalid port specification `{0}`")]
    InvalidPorts(String),
    #[error("rule set has no interfaces")]
    NoInterfaces,
    #[error("invalid interface specification `{0}`")]
    InvalidInterface(String),
    #[error("duplicate interface `{0}`")]
    DuplicateInterface(String),
    #[error("chain name `{chain}` exceeds {max} characters")]
    ChainNameTooLong { chain: String, max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
