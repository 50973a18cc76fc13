// Session minting for the cookie-based identity boundary. Lookup lives in
// the extractor; expiry is relative to the database clock.

use rand::Rng;
use rusqlite::params;

use crate::error::AppResult;
use crate::state::DbPool;

/// Mint a session for a user and return the bearer token.
pub fn create_session(pool: &DbPool, user_id: &str, hours: u64) -> AppResult<String> {
    let token = generate_token();
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at)
         VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![
            uuid::Uuid::now_v7().to_string(),
            user_id,
            token,
            format!("+{hours} hours"),
        ],
    )?;
    Ok(token)
}

/// 32 random bytes, hex encoded.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
