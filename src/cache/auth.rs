use crate::cache::CacheService;
use redis::AsyncCommands;
use tracing::info;

impl CacheService {
    /// Сохранить токен сброса пароля (email по токену)
    pub async fn store_reset_token(
        &self,
        token: &str,
        email: &str,
        ttl_seconds: u64,
    ) -> Result<(), redis::RedisError> {
        let key = format!("reset:{}", token);
        let mut conn = self.redis.conn.clone();
        conn.set_ex(key, email, ttl_seconds).await
    }

    /// Токен одноразовый: читаем и сразу удаляем
    pub async fn take_reset_token(&self, token: &str) -> Result<Option<String>, redis::RedisError> {
        let key = format!("reset:{}", token);
        let mut conn = self.redis.conn.clone();
        conn.get_del(key).await
    }

    /// Отозвать сессию (logout) до истечения срока токена
    pub async fn revoke_session(&self, jti: &str, ttl_seconds: u64) -> Result<(), redis::RedisError> {
        let key = format!("revoked:{}", jti);
        let mut conn = self.redis.conn.clone();
        let _: () = conn.set_ex(key, 1, ttl_seconds.max(1)).await?;
        info!("Session {} revoked", jti);
        Ok(())
    }

    pub async fn is_session_revoked(&self, jti: &str) -> Result<bool, redis::RedisError> {
        let key = format!("revoked:{}", jti);
        let mut conn = self.redis.conn.clone();
        conn.exists(key).await
    }
}
