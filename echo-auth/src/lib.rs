pub mod jwt;
pub mod options;
pub mod password;
pub mod strategy;

pub use jwt::{extract_bearer_token, Claims, TokenError, TokenPair, TokenService, TokenType};
pub use options::{AuthOptions, JwtAlgorithm, JwtOptions, LocalOptions};
pub use password::PasswordHasher;
pub use strategy::{AuthenticationService, BearerStrategy, LocalStrategy};
