// ==========================================
// 雏鸡订单分配系统 - 口令哈希
// ==========================================
// 算法: Argon2id（默认参数），存储 PHC 格式字符串
// ==========================================

use crate::auth::error::AuthError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// 生成口令哈希（PHC 字符串）
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Crypto(format!("哈希失败: {e}")))
}

/// 校验口令
///
/// # 返回
/// - Ok(true): 匹配
/// - Ok(false): 不匹配
/// - Err(Crypto): 存储的哈希格式错误
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("哈希格式错误: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("校验失败: {e}"))),
    }
}
