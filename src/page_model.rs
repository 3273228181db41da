//! Locators for the copyright-appeal page flow
//!
//! Every selector string the automation touches lives here, so adapting to
//! a changed target page touches this module and nothing else. The form is
//! built on Element-UI widgets whose labels, not ids, are the stable
//! handles, hence the label-scoped locator variant.

use serde::{Deserialize, Serialize};

/// How to find one element on the target page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locator {
    /// Plain CSS selector
    Css(String),
    /// The first element matching `scope` whose text contains `label`;
    /// the target is `inner` inside that element, or the element itself
    Labeled {
        scope: String,
        label: String,
        inner: Option<String>,
    },
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Locator::Css(selector.to_string())
    }

    pub fn labeled(scope: &str, label: &str, inner: Option<&str>) -> Self {
        Locator::Labeled {
            scope: scope.to_string(),
            label: label.to_string(),
            inner: inner.map(|s| s.to_string()),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(css) => write!(f, "{}", css),
            Locator::Labeled { scope, label, inner } => match inner {
                Some(inner) => write!(f, "{}[{}] {}", scope, label, inner),
                None => write!(f, "{}[{}]", scope, label),
            },
        }
    }
}

/// An upload widget whose internals are not under our control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetLocator {
    /// Human-readable name for logs and errors
    pub name: String,
    /// Container holding the whole widget
    pub scope: Locator,
    /// File input inside the container (often hidden)
    pub input: String,
    /// Clickable element that opens the native picker
    pub trigger: String,
    /// Per-attachment indicator counted to verify success
    pub attached_item: String,
}

impl WidgetLocator {
    fn upload_form_item(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: Locator::labeled(".el-form-item", label, None),
            input: r#"input[type="file"]"#.to_string(),
            trigger: ".el-upload".to_string(),
            attached_item: ".el-upload-list__item".to_string(),
        }
    }
}

/// All locators for the appeal flow, stage by stage
#[derive(Debug, Clone)]
pub struct AppealPageModel {
    /// Entry URL of the appeal form
    pub form_url: String,

    // Identity stage
    pub real_name: Locator,
    pub phone: Locator,
    pub email: Locator,
    pub id_card_number: Locator,
    pub id_card_upload: WidgetLocator,

    // Rights stage
    pub owner: Locator,
    pub work_type_trigger: Locator,
    pub work_type_option_scope: String,
    pub work_name: Locator,
    pub work_date_start: Locator,
    pub work_date_end: Locator,
    pub auth_date_start: Locator,
    pub auth_date_end: Locator,
    pub auth_upload: WidgetLocator,
    pub proof_upload: WidgetLocator,

    // Appeal stage
    pub infringing_url: Locator,
    pub description: Locator,
    pub original_url: Locator,
    pub guarantee_checkbox: Locator,

    // Navigation
    pub next_button: Locator,
    pub submit_button: Locator,

    /// Complaint text filled into the description field
    pub description_text: String,
}

impl Default for AppealPageModel {
    fn default() -> Self {
        Self {
            form_url: "https://www.bilibili.com/v/copyright/apply?origin=home".to_string(),

            real_name: Locator::css(r#"input[placeholder="真实姓名"].el-input__inner"#),
            phone: Locator::css(r#"input[placeholder="手机号"].el-input__inner"#),
            email: Locator::labeled(".el-form-item", "邮箱", Some("input.el-input__inner")),
            id_card_number: Locator::css(r#"input[placeholder="证件号码"].el-input__inner"#),
            id_card_upload: WidgetLocator::upload_form_item("id card documents", "证件证明"),

            owner: Locator::labeled(".el-form-item", "权利人", Some("input.el-input__inner")),
            work_type_trigger: Locator::labeled(".el-form-item", "著作类型", Some(".el-select")),
            work_type_option_scope: ".el-select-dropdown__item".to_string(),
            work_name: Locator::labeled(".el-form-item", "著作名称", Some("input.el-input__inner")),
            work_date_start: Locator::css(r#"input[placeholder="起始时间"]"#),
            work_date_end: Locator::css(r#"input[placeholder="结束时间"]"#),
            auth_date_start: Locator::labeled(
                ".el-form-item",
                "授权期限",
                Some(r#"input[placeholder="起始时间"]"#),
            ),
            auth_date_end: Locator::labeled(
                ".el-form-item",
                "授权期限",
                Some(r#"input[placeholder="结束时间"]"#),
            ),
            auth_upload: WidgetLocator::upload_form_item("authorization documents", "授权证明"),
            proof_upload: WidgetLocator::upload_form_item("ownership proof documents", "证明"),

            infringing_url: Locator::css(r#"input[placeholder*="他人发布的B站侵权链接"]"#),
            description: Locator::css(r#"textarea[placeholder*="该链接内容全部"]"#),
            original_url: Locator::labeled(".textarea-wrapper", "原创链接", Some("input")),
            guarantee_checkbox: Locator::labeled(".el-checkbox__label", "本人保证", None),

            next_button: Locator::labeled("button", "下一步", None),
            submit_button: Locator::labeled("button", "提交", None),

            description_text: "该链接内容侵犯了我的版权，要求立即删除。".to_string(),
        }
    }
}
