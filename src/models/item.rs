//! 题目模型
//!
//! `Item` 是一次运行中的工作单元。题型用带数据的枚举表达，
//! 构造时即完成校验，后续的查询/填充不再处理残缺的数据。

use serde::{Deserialize, Serialize};

use crate::error::ItemError;

/// 题型（不带数据，用于接口传参和上传）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    /// 单选题
    SingleChoice,
    /// 多选题
    MultiChoice,
    /// 判断题
    Boolean,
    /// 填空题
    FillBlank,
    /// 简答题
    ShortAnswer,
}

static TYPE_CODES: phf::Map<&'static str, QuestionType> = phf::phf_map! {
    "0" => QuestionType::SingleChoice,
    "1" => QuestionType::MultiChoice,
    "2" => QuestionType::Boolean,
    "3" => QuestionType::FillBlank,
    "4" => QuestionType::ShortAnswer,
    "single" => QuestionType::SingleChoice,
    "multiple" => QuestionType::MultiChoice,
    "boolean" => QuestionType::Boolean,
    "judgment" => QuestionType::Boolean,
    "fill" => QuestionType::FillBlank,
    "short" => QuestionType::ShortAnswer,
};

impl QuestionType {
    /// 平台使用的题型代码
    pub fn code(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "0",
            QuestionType::MultiChoice => "1",
            QuestionType::Boolean => "2",
            QuestionType::FillBlank => "3",
            QuestionType::ShortAnswer => "4",
        }
    }

    /// 中文名称
    pub fn name(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "单选题",
            QuestionType::MultiChoice => "多选题",
            QuestionType::Boolean => "判断题",
            QuestionType::FillBlank => "填空题",
            QuestionType::ShortAnswer => "简答题",
        }
    }

    /// 从题型代码或英文名解析
    pub fn from_code(code: &str) -> Option<Self> {
        TYPE_CODES.get(code.trim().to_lowercase().as_str()).copied()
    }

    pub fn is_choice(self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultiChoice)
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 题型及其专属数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    SingleChoice { options: Vec<String> },
    MultiChoice { options: Vec<String> },
    Boolean,
    FillBlank,
    ShortAnswer,
}

impl ItemKind {
    /// 根据题型和选项构建，选择题至少需要两个选项
    pub fn new(id: &str, question_type: QuestionType, options: Vec<String>) -> Result<Self, ItemError> {
        if question_type.is_choice() && options.len() < 2 {
            return Err(ItemError::TooFewOptions {
                id: id.to_string(),
                count: options.len(),
            });
        }

        Ok(match question_type {
            QuestionType::SingleChoice => ItemKind::SingleChoice { options },
            QuestionType::MultiChoice => ItemKind::MultiChoice { options },
            QuestionType::Boolean => ItemKind::Boolean,
            QuestionType::FillBlank => ItemKind::FillBlank,
            QuestionType::ShortAnswer => ItemKind::ShortAnswer,
        })
    }

    pub fn question_type(&self) -> QuestionType {
        match self {
            ItemKind::SingleChoice { .. } => QuestionType::SingleChoice,
            ItemKind::MultiChoice { .. } => QuestionType::MultiChoice,
            ItemKind::Boolean => QuestionType::Boolean,
            ItemKind::FillBlank => QuestionType::FillBlank,
            ItemKind::ShortAnswer => QuestionType::ShortAnswer,
        }
    }

    /// 选项列表，非选择题为空
    pub fn options(&self) -> &[String] {
        match self {
            ItemKind::SingleChoice { options } | ItemKind::MultiChoice { options } => options,
            _ => &[],
        }
    }
}

/// 题目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    Pending,
    Resolved,
    Applied,
    VerifiedCorrect,
    VerifiedWrong,
    Failed,
}

impl ItemStatus {
    /// 是否为终态
    pub fn is_final(self) -> bool {
        matches!(self, ItemStatus::VerifiedCorrect | ItemStatus::Failed)
    }
}

/// 题目
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    id: String,
    kind: ItemKind,
    content: String,
    attempted_answers: Vec<String>,
    status: ItemStatus,
}

impl Item {
    /// 创建新题目，ID 和内容不能为空
    pub fn new(id: impl Into<String>, content: impl Into<String>, kind: ItemKind) -> Result<Self, ItemError> {
        let id = id.into().trim().to_string();
        let content = content.into();

        if id.is_empty() {
            return Err(ItemError::EmptyId);
        }
        if content.trim().is_empty() {
            return Err(ItemError::EmptyContent { id });
        }

        Ok(Self {
            id,
            kind,
            content,
            attempted_answers: Vec::new(),
            status: ItemStatus::Pending,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    pub fn question_type(&self) -> QuestionType {
        self.kind.question_type()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn options(&self) -> &[String] {
        self.kind.options()
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ItemStatus) {
        self.status = status;
    }

    /// 已尝试过的答案（只增不减）
    pub fn attempted_answers(&self) -> &[String] {
        &self.attempted_answers
    }

    /// 最近一次尝试的答案
    pub fn last_attempt(&self) -> Option<&str> {
        self.attempted_answers.last().map(String::as_str)
    }

    /// 记录一次尝试
    pub fn record_attempt(&mut self, answer: impl Into<String>) {
        self.attempted_answers.push(answer.into());
    }

    /// 把 ID 换成规范 ID（别名表归一化后使用）
    pub(crate) fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// 为下一轮重新置为待处理，保留尝试记录
    pub fn reseed(&mut self) {
        self.status = ItemStatus::Pending;
    }
}

/// 原始题目记录（TOML 文件 / 外部接口）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(alias = "questionId")]
    pub id: String,
    #[serde(rename = "type", alias = "questionType")]
    pub question_type: String,
    #[serde(alias = "questionContent")]
    pub content: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, alias = "attemptedAnswers")]
    pub attempted_answers: Vec<String>,
}

impl TryFrom<RawItem> for Item {
    type Error = ItemError;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        let question_type =
            QuestionType::from_code(&raw.question_type).ok_or_else(|| ItemError::UnknownType {
                id: raw.id.clone(),
                code: raw.question_type.clone(),
            })?;
        let kind = ItemKind::new(&raw.id, question_type, raw.options)?;
        let mut item = Item::new(raw.id, raw.content, kind)?;
        for answer in raw.attempted_answers {
            item.record_attempt(answer);
        }
        Ok(item)
    }
}

/// 批改接口返回的错题记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongItem {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub wrong_answer: String,
}

impl TryFrom<WrongItem> for Item {
    type Error = ItemError;

    /// 错题转成待纠错题目，尝试记录从空开始
    fn try_from(wrong: WrongItem) -> Result<Self, Self::Error> {
        Item::try_from(RawItem {
            id: wrong.id,
            question_type: wrong.question_type,
            content: wrong.content,
            options: wrong.options,
            attempted_answers: Vec::new(),
        })
    }
}

/// 批改接口返回的已判对题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// 平台认可的答案
    #[serde(default)]
    pub answer: String,
}

impl TryFrom<&GradedItem> for Item {
    type Error = ItemError;

    fn try_from(graded: &GradedItem) -> Result<Self, Self::Error> {
        Item::try_from(RawItem {
            id: graded.id.clone(),
            question_type: graded.question_type.clone(),
            content: graded.content.clone(),
            options: graded.options.clone(),
            attempted_answers: Vec::new(),
        })
    }
}
