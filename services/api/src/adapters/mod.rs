pub mod db;
pub mod gemini;
pub mod jwt;
pub mod password;

pub use db::DbAdapter;
pub use gemini::GeminiClient;
pub use jwt::JwtTokenService;
pub use password::Argon2Hasher;
