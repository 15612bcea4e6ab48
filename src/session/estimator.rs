//! Token 估算（字符计数近似）

/// 估算器：英文约 4 字符/token，中文约 1.5 字符/token
pub struct TokenEstimator;

impl TokenEstimator {
    /// 估算文本的 token 数量，空文本也按 1 计
    pub fn estimate(text: &str) -> usize {
        let mut ascii_chars = 0;
        let mut non_ascii_chars = 0;

        for c in text.chars() {
            if c.is_ascii() {
                ascii_chars += 1;
            } else {
                non_ascii_chars += 1;
            }
        }

        let mut tokens = ascii_chars / 4;
        tokens += (non_ascii_chars as f64 / 1.5).ceil() as usize;

        tokens.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_english() {
        let text = "Hello, world! This is a test.";
        let tokens = TokenEstimator::estimate(text);
        assert!(tokens > 0);
        assert!(tokens < text.len());
    }

    #[test]
    fn test_estimate_chinese() {
        let tokens = TokenEstimator::estimate("你好世界，这是一个测试。");
        assert!(tokens >= 8);
    }

    #[test]
    fn test_estimate_empty_is_one() {
        assert_eq!(TokenEstimator::estimate(""), 1);
    }
}
