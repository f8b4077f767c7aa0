use serde::{Deserialize, Serialize};

use crate::models::answer::{answer_text, normalize_answer};
use crate::models::item::{Item, QuestionType};

/// 上传来源：平台批改确认
pub const SOURCE_PLATFORM_VERIFIED: &str = "platform_verified";

/// 上传到云端题库的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub question_id: String,
    pub question_content: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub answer: String,
    pub answer_text: String,
    pub options: Vec<String>,
    pub confidence: f64,
    pub source: String,
    pub platform: String,
}

impl UploadRecord {
    /// 由题目和经过确认的答案构建
    pub fn verified(item: &Item, answer: &str, platform: &str) -> Self {
        let question_type = item.question_type();
        let answer = match question_type {
            // 只有填空题需要清理【】，其余保持原样
            QuestionType::FillBlank => normalize_answer(answer, question_type),
            _ => answer.trim().to_string(),
        };

        Self {
            question_id: item.id().to_string(),
            question_content: item.content().to_string(),
            question_type: question_type.code().to_string(),
            answer_text: answer_text(&answer, item.options(), question_type),
            answer,
            options: item.options().to_vec(),
            confidence: 1.0,
            source: SOURCE_PLATFORM_VERIFIED.to_string(),
            platform: platform.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::ItemKind;

    #[test]
    fn test_verified_choice_record() {
        let kind = ItemKind::MultiChoice {
            options: vec!["红".into(), "黄".into(), "蓝".into()],
        };
        let item = Item::new("m1", "三原色包括？", kind).unwrap();
        let record = UploadRecord::verified(&item, "A,C", "czbk");

        assert_eq!(record.question_type, "1");
        assert_eq!(record.answer_text, "红；蓝");
        assert_eq!(record.confidence, 1.0);
        assert_eq!(record.source, SOURCE_PLATFORM_VERIFIED);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["questionId"], "m1");
        assert_eq!(json["type"], "1");
    }

    #[test]
    fn test_fill_blank_brackets_removed() {
        let item = Item::new("f1", "植物制造养分的过程叫____", ItemKind::FillBlank).unwrap();
        let record = UploadRecord::verified(&item, "【光合作用】", "czbk");
        assert_eq!(record.answer, "光合作用");
        assert_eq!(record.answer_text, "光合作用");
    }
}
