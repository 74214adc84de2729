pub mod validation;

use bcrypt::{hash, verify};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

fn default_page_number() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

/// 分页参数，页码从 1 开始
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Page {
    #[serde(default = "default_page_number")]
    #[validate(range(min = 1, message = "page_number must be at least 1"))]
    pub page_number: u32,
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100, message = "page_size must be between 1 and 100"))]
    pub page_size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page_number: default_page_number(),
            page_size: default_page_size(),
        }
    }
}

impl Page {
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number,
            page_size,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page_number.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }

    /// 对内存中的有序集合取当前页
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset() as usize)
            .take(self.limit() as usize)
            .cloned()
            .collect()
    }
}

pub fn page_count(total_items: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_items.div_ceil(u64::from(page_size))
}

/// 分页列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub page_count: u64,
    pub count: u64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total_items: u64, page: &Page) -> Self {
        Self {
            data,
            page_count: page_count(total_items, page.page_size),
            count: total_items,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            page_count: self.page_count,
            count: self.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(25, 10), 3);
        assert_eq!(page_count(30, 10), 3);
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(1, 10), 1);
    }

    #[test]
    fn last_page_holds_the_remainder() {
        let items: Vec<u32> = (0..25).collect();
        let last = Page::new(3, 10);
        assert_eq!(last.offset(), 20);
        assert_eq!(last.slice(&items), vec![20, 21, 22, 23, 24]);
        assert!(Page::new(4, 10).slice(&items).is_empty());
    }

    #[test]
    fn page_bounds_are_validated() {
        assert!(Page::default().validate().is_ok());
        assert!(Page::new(0, 10).validate().is_err());
        assert!(Page::new(1, 101).validate().is_err());
    }

    #[test]
    fn password_hash_round_trip() {
        let hashed = hash_password("Abcd1234", 4).unwrap();
        assert!(verify_password("Abcd1234", &hashed).unwrap());
        assert!(!verify_password("abcd1234", &hashed).unwrap());
    }
}
