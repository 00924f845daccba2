use crate::{configuration::Configuration, spec::SpecRef};

use super::{Extension, ExtensionDescriptor};

/// 过滤器的判定结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterDecision {
    Include,
    Exclude(String),
}

impl FilterDecision {
    pub fn is_excluded(&self) -> bool {
        matches!(self, Self::Exclude(_))
    }
}

/// Spec 过滤器：决定某个 Spec 是否参与本次运行。
///
/// 判定须为纯函数，执行期间不应修改配置。
pub trait SpecFilter: Send + Sync {
    fn filter(&self, spec: &SpecRef, configuration: &Configuration) -> FilterDecision;
}

/// 按配置中的标签表达式过滤 Spec。
///
/// 平台默认值阶段在支持标签探测的平台上注册该过滤器。
#[derive(Debug, Default)]
pub struct TagFilter;

impl SpecFilter for TagFilter {
    fn filter(&self, spec: &SpecRef, configuration: &Configuration) -> FilterDecision {
        let expression = configuration.tag_expression();
        if expression.allows(&spec.tags()) {
            FilterDecision::Include
        } else {
            FilterDecision::Exclude(format!("tags of `{}` do not match the tag expression", spec.id()))
        }
    }
}

impl Extension for TagFilter {
    fn descriptor(&self) -> ExtensionDescriptor {
        ExtensionDescriptor::new("spark.tag_filter", "filters specs by include/exclude tags")
    }

    fn as_filter(&self) -> Option<&dyn SpecFilter> {
        Some(self)
    }
}
