use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// 用户列表
pub const USER_LIST: &str = "user_list";
/// 用户详情
pub const USER_DETAIL: &str = "user_detail";
pub const RECIPE_LIST: &str = "recipe_list";
pub const RECIPE_DETAIL: &str = "recipe_detail";
pub const TAG_LIST: &str = "tag_list";
pub const USER_FOLLOWER_LIST: &str = "user_follower_list";
pub const USER_FOLLOWING_LIST: &str = "user_following_list";

/// 用户列表变化较快，单独使用较短的过期时间
pub const USER_LIST_TTL: Duration = Duration::from_secs(1000);

// 菜谱写操作影响的缓存
pub const RECIPE_WRITE_FAMILIES: [&str; 4] = [RECIPE_LIST, RECIPE_DETAIL, USER_LIST, USER_DETAIL];

pub const RELATION_FAMILIES: [&str; 2] = [USER_FOLLOWER_LIST, USER_FOLLOWING_LIST];

// 用户资料嵌在菜谱和关注列表中，资料变化时一并失效
pub const USER_WRITE_FAMILIES: [&str; 6] = [
    USER_LIST,
    USER_DETAIL,
    RECIPE_LIST,
    RECIPE_DETAIL,
    USER_FOLLOWER_LIST,
    USER_FOLLOWING_LIST,
];

// 在线状态影响 is_online 过滤的用户列表
pub const ONLINE_STATE_FAMILIES: [&str; 2] = [USER_LIST, USER_DETAIL];

/// 参数摘要，参数序列化为 JSON 后取 sha256
pub fn args_digest<A: Serialize + ?Sized>(args: &A) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(args)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// 缓存键: prefix + key_name + ":" + digest
pub fn entry_key(prefix: &str, key_name: &str, digest: &str) -> String {
    format!("{}{}:{}", prefix, key_name, digest)
}

/// 同一族缓存的公共前缀
pub fn family_prefix(prefix: &str, key_name: &str) -> String {
    format!("{}{}:", prefix, key_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_depends_on_arguments() {
        let a = args_digest(&(1, "x")).unwrap();
        let b = args_digest(&(1, "x")).unwrap();
        let c = args_digest(&(2, "x")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn entry_keys_share_the_family_prefix() {
        let key = entry_key("cache:", USER_LIST, "abc");
        assert_eq!(key, "cache:user_list:abc");
        assert!(key.starts_with(&family_prefix("cache:", USER_LIST)));
        // 不同族的前缀互不包含
        assert!(!family_prefix("cache:", USER_LIST).starts_with(&family_prefix("cache:", USER_DETAIL)));
    }
}
