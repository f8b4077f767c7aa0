//! 页面填写 - 业务能力层
//!
//! 通过 `JsExecutor` 把答案写到页面上对应的题目控件（按 `data-id` 定位）。
//! 题目在流程中使用规范 ID，定位控件前按别名表换回页面ID。

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::infrastructure::JsExecutor;
use crate::models::answer::{normalize_answer, parse_letters};
use crate::models::{IdAliasMap, Item, QuestionType};
use crate::services::ports::AnswerApplier;

const FILL_SCRIPT: &str = r#"
(async (args) => {
    const sleep = (ms) => new Promise(r => setTimeout(r, ms));
    const item = document.querySelector(`[data-id="${args.id}"]`);
    if (!item) return { ok: false, error: 'element not found' };

    const fire = (el) => ['input', 'change', 'blur'].forEach(t =>
        el.dispatchEvent(new Event(t, { bubbles: true, cancelable: true })));

    switch (args.kind) {
        case 'single': {
            const radios = Array.from(item.querySelectorAll('input[type="radio"]'));
            const target = radios.find(r => r.value === args.letters[0]) || radios[args.indexes[0]];
            if (!target) return { ok: false, error: 'radio not found' };
            target.click();
            break;
        }
        case 'multi': {
            const boxes = Array.from(item.querySelectorAll('input[type="checkbox"]'));
            if (boxes.length === 0) return { ok: false, error: 'checkbox not found' };
            for (let i = 0; i < boxes.length; i++) {
                if (args.indexes.includes(i) !== boxes[i].checked) {
                    boxes[i].click();
                    await sleep(100);
                }
            }
            break;
        }
        case 'judgment': {
            const radios = Array.from(item.querySelectorAll('input[type="radio"]'));
            const target = radios.find(r => r.value === args.answer);
            if (!target) return { ok: false, error: 'judgment option not found' };
            target.click();
            break;
        }
        case 'fill': {
            const inputs = Array.from(item.querySelectorAll('input.tk_input'));
            if (inputs.length === 0) return { ok: false, error: 'input not found' };
            const parts = inputs.length > 1 ? args.answer.split(/[,，]/) : [args.answer];
            inputs.forEach((input, i) => {
                input.value = (parts[i] || '').trim();
                fire(input);
            });
            break;
        }
        default: {
            const area = item.querySelector('textarea.ke-edit-textarea') || item.querySelector('textarea');
            if (!area) return { ok: false, error: 'textarea not found' };
            area.value = args.answer;
            fire(area);
        }
    }
    return { ok: true };
})
"#;

/// 页面答案填写
pub struct PageApplier {
    executor: JsExecutor,
    aliases: IdAliasMap,
}

impl PageApplier {
    pub fn new(executor: JsExecutor) -> Self {
        Self {
            executor,
            aliases: IdAliasMap::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: IdAliasMap) -> Self {
        self.aliases = aliases;
        self
    }

    /// 生成填写脚本的参数
    fn fill_args(item: &Item, value: &str, aliases: &IdAliasMap) -> serde_json::Value {
        let question_type = item.question_type();
        let letters = parse_letters(value);
        let kind = match question_type {
            QuestionType::SingleChoice => "single",
            QuestionType::MultiChoice => "multi",
            QuestionType::Boolean => "judgment",
            QuestionType::FillBlank => "fill",
            QuestionType::ShortAnswer => "short",
        };

        json!({
            "id": aliases.platform_id(item.id()),
            "kind": kind,
            "answer": normalize_answer(value, question_type),
            "letters": letters.iter().map(char::to_string).collect::<Vec<_>>(),
            "indexes": letters.iter().map(|c| (*c as u8 - b'A') as usize).collect::<Vec<_>>(),
        })
    }
}

#[async_trait]
impl AnswerApplier for PageApplier {
    async fn apply(&self, item: &Item, value: &str) -> Result<bool> {
        let args = Self::fill_args(item, value, &self.aliases);
        let script = format!("{}({})", FILL_SCRIPT.trim(), args);

        let result = self.executor.eval(script).await?;
        if result["ok"].as_bool() == Some(true) {
            debug!("[填写] 题目 {} 填写成功: {}", item.id(), value);
            Ok(true)
        } else {
            warn!(
                "[填写] 题目 {} 填写失败: {}",
                item.id(),
                result["error"].as_str().unwrap_or("未知错误")
            );
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;

    #[test]
    fn test_fill_args_for_multi_choice() {
        let kind = ItemKind::MultiChoice {
            options: vec!["甲".into(), "乙".into(), "丙".into(), "丁".into()],
        };
        let item = Item::new("m1", "多选", kind).unwrap();
        let args = PageApplier::fill_args(&item, "a，d", &IdAliasMap::new());

        assert_eq!(args["id"], "m1");
        assert_eq!(args["kind"], "multi");
        assert_eq!(args["answer"], "A,D");
        assert_eq!(args["indexes"], json!([0, 3]));
    }

    #[test]
    fn test_fill_args_for_judgment() {
        let item = Item::new("j1", "判断", ItemKind::Boolean).unwrap();
        let args = PageApplier::fill_args(&item, "正确", &IdAliasMap::new());
        assert_eq!(args["kind"], "judgment");
        assert_eq!(args["answer"], "对");
    }

    #[test]
    fn test_fill_args_use_page_id() {
        let aliases = IdAliasMap::from_pairs([("bank-7", "page-7")]).unwrap();
        let item = Item::new("bank-7", "填空", ItemKind::FillBlank).unwrap();
        let args = PageApplier::fill_args(&item, "【答案】", &aliases);

        assert_eq!(args["id"], "page-7");
        assert_eq!(args["answer"], "答案");
    }
}
