//! 答案格式工具
//!
//! 处理字母/文本/判断题等不同答案写法之间的转换

use crate::models::item::QuestionType;

static TRUE_ANSWERS: phf::Set<&'static str> = phf::phf_set! {
    "对", "正确", "true", "1", "t", "√", "yes",
};

static FALSE_ANSWERS: phf::Set<&'static str> = phf::phf_set! {
    "错", "错误", "false", "0", "f", "×", "no",
};

/// 解析选择题答案为大写字母列表
///
/// 支持 `"A,B"`、`"A，B"`、`"AB"`、`"a b"` 等写法，结果去重并保持顺序
pub fn parse_letters(answer: &str) -> Vec<char> {
    let mut letters = Vec::new();
    for c in answer.chars().filter(char::is_ascii_alphabetic) {
        let c = c.to_ascii_uppercase();
        if !letters.contains(&c) {
            letters.push(c);
        }
    }
    letters
}

/// 规范化判断题答案为 "对" / "错"
pub fn normalize_judgment(answer: &str) -> Option<&'static str> {
    let key = answer.trim().to_lowercase();
    if TRUE_ANSWERS.contains(key.as_str()) {
        Some("对")
    } else if FALSE_ANSWERS.contains(key.as_str()) {
        Some("错")
    } else {
        None
    }
}

/// 清理填空题答案中的【】
pub fn clean_fill_brackets(answer: &str) -> String {
    answer.replace(['【', '】'], "").trim().to_string()
}

/// 生成答案的文本说明，选择题把字母换成选项内容
pub fn answer_text(answer: &str, options: &[String], question_type: QuestionType) -> String {
    if !question_type.is_choice() || options.is_empty() {
        return answer.to_string();
    }

    parse_letters(answer)
        .into_iter()
        .map(|letter| {
            let index = (letter as u8 - b'A') as usize;
            options
                .get(index)
                .cloned()
                .unwrap_or_else(|| letter.to_string())
        })
        .collect::<Vec<_>>()
        .join("；")
}

/// 按题型规范化一个答案，用于比较和上传
pub fn normalize_answer(answer: &str, question_type: QuestionType) -> String {
    match question_type {
        QuestionType::SingleChoice | QuestionType::MultiChoice => {
            let mut letters = parse_letters(answer);
            // 多选题的选择与字母顺序无关
            letters.sort_unstable();
            if letters.is_empty() {
                answer.trim().to_string()
            } else {
                letters
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            }
        }
        QuestionType::Boolean => normalize_judgment(answer)
            .map(str::to_string)
            .unwrap_or_else(|| answer.trim().to_string()),
        QuestionType::FillBlank => clean_fill_brackets(answer),
        QuestionType::ShortAnswer => answer.trim().to_string(),
    }
}

/// 多选题只有一个答案时给出警告（题库可能不完整）
pub fn multi_choice_warning(question_type: QuestionType, answer: &str) -> Option<String> {
    if question_type != QuestionType::MultiChoice {
        return None;
    }
    if parse_letters(answer).len() == 1 {
        Some(format!("⚠️ 多选题只有1个答案 \"{}\"，题库可能不完整", answer))
    } else {
        None
    }
}
