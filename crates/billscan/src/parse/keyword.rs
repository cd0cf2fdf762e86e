//! Offline rule-based parser for common Chinese payment screenshots and receipts.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use super::fields::{parse_amount, TransactionFields};
use super::{check_text_length, StructuredParser};
use crate::error::ParseError;

static RE_LABELED_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:实付款|实付|付款金额|支付金额|交易金额|金额|合计|总计|total|amount)[^\d\-+]{0,8}([\-+]?\d[\d,]*(?:\.\d{1,2})?)").unwrap()
});
static RE_SYMBOL_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:[¥￥$]|CNY|RMB)\s*([\-+]?\d[\d,]*(?:\.\d{1,2})?)").unwrap());
static RE_SIGNED_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*([\-+]\d[\d,]*\.\d{2})\s*$").unwrap());
static RE_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*[-/.年]\s*(\d{1,2})\s*[-/.月]\s*(\d{1,2})\s*日?\s*(\d{1,2})\s*[:：]\s*(\d{2})(?:\s*[:：]\s*(\d{2}))?").unwrap()
});
static RE_MERCHANT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(?:商户全称|商户名称|商户|商家|收款方|merchant)\s*[:：]?\s*(\S[^\n]*)").unwrap()
});

/// Payment platforms, as (canonical name, case-insensitive keywords).
const PAYMENT_METHODS: &[(&str, &[&str])] = &[
    ("支付宝", &["支付宝", "alipay"]),
    ("微信支付", &["微信", "wechat", "零钱通"]),
    ("华为支付", &["华为", "huawei pay"]),
    ("云闪付", &["云闪付", "银联", "unionpay"]),
    ("Apple Pay", &["apple pay"]),
    ("银行卡", &["储蓄卡", "信用卡", "银行卡"]),
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("餐饮", &["餐", "饭", "咖啡", "奶茶", "星巴克", "瑞幸", "麦当劳", "肯德基", "美团外卖", "饿了么", "coffee", "restaurant"]),
    ("交通", &["地铁", "公交", "打车", "滴滴", "出租", "高铁", "火车票", "机票", "加油", "停车", "taxi", "metro"]),
    ("医疗", &["医院", "药房", "药店", "诊所", "pharmacy"]),
    ("教育", &["学费", "培训", "课程", "书店", "教育"]),
    ("生活缴费", &["电费", "水费", "燃气", "话费", "宽带", "物业", "缴费"]),
    ("娱乐", &["电影", "影城", "游戏", "ktv", "演出", "cinema"]),
    ("购物", &["淘宝", "天猫", "京东", "拼多多", "超市", "商城", "便利店", "mart", "shop"]),
];

const FALLBACK_CATEGORY: &str = "其他";

pub struct KeywordParser {
    min_text_length: usize,
}

impl KeywordParser {
    pub fn new(min_text_length: usize) -> Self {
        Self { min_text_length }
    }

    pub fn parse_text(&self, text: &str) -> Result<TransactionFields, ParseError> {
        check_text_length(text, self.min_text_length)?;

        let lowered = text.to_lowercase();
        let payment_method = match_keywords(&lowered, PAYMENT_METHODS)
            .ok_or(ParseError::MissingField("payment method"))?;
        let amount = find_amount(text).ok_or(ParseError::MissingField("amount"))?;
        let transaction_time =
            find_datetime(text).ok_or(ParseError::MissingField("transaction time"))?;
        let category = match_keywords(&lowered, CATEGORIES).unwrap_or(FALLBACK_CATEGORY);

        Ok(TransactionFields {
            payment_method: payment_method.to_string(),
            amount,
            transaction_time,
            category: category.to_string(),
            merchant: find_merchant(text),
            description: None,
        })
    }
}

#[async_trait]
impl StructuredParser for KeywordParser {
    async fn parse(&self, text: &str) -> Result<TransactionFields, ParseError> {
        self.parse_text(text)
    }
}

fn match_keywords(lowered: &str, table: &[(&'static str, &[&str])]) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(name, _)| *name)
}

/// Labeled amounts win over currency-prefixed ones, which win over a bare signed line.
fn find_amount(text: &str) -> Option<f64> {
    [&*RE_LABELED_AMOUNT, &*RE_SYMBOL_AMOUNT, &*RE_SIGNED_AMOUNT]
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| parse_amount(&caps[1]))
        // Payment apps show spending as a negative balance change.
        .map(f64::abs)
}

fn find_datetime(text: &str) -> Option<NaiveDateTime> {
    let caps = RE_DATETIME.captures(text)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps[1].parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?;
    date.and_hms_opt(num(4)?, num(5)?, num(6).unwrap_or(0))
}

fn find_merchant(text: &str) -> Option<String> {
    RE_MERCHANT
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|m| !m.is_empty())
}
