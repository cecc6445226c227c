use log::{debug, info, warn};

use crate::error::{EntityKind, ImportError};
use crate::kimai::{Activity, EntityId, KimaiError, KimaiRepository, Project};

/// アクティビティを探す方法。
///
/// `ACTIVITY_STRATEGIES`の順に試し、最初に見つかったものを採用する。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivityStrategy {
    /// プロジェクトに絞り込んで検索し、名前が一致するものを採用する。
    ProjectScoped,
    /// 絞り込まずに検索し、どのプロジェクトにも属さない共通アクティビティのみ採用する。
    Global,
}

pub const ACTIVITY_STRATEGIES: [ActivityStrategy; 2] =
    [ActivityStrategy::ProjectScoped, ActivityStrategy::Global];

impl ActivityStrategy {
    /// 検索結果の中から採用するアクティビティを選ぶ。
    ///
    /// 他のプロジェクトに属するアクティビティはどの方法でも採用しない。
    pub fn select(
        &self,
        candidates: Vec<Activity>,
        project_id: &EntityId,
        name: &str,
    ) -> Option<Activity> {
        candidates.into_iter().find(|activity| {
            let in_scope = match (self, &activity.project) {
                (_, None) => true,
                (ActivityStrategy::ProjectScoped, Some(project)) => project == project_id,
                (ActivityStrategy::Global, Some(_)) => false,
            };
            in_scope && name_matches(activity.name.as_deref(), name)
        })
    }

    /// この方法で検索を行い、採用するアクティビティを返す。
    async fn find<T: KimaiRepository + ?Sized>(
        &self,
        kimai: &T,
        project_id: &EntityId,
        name: &str,
    ) -> Result<Option<Activity>, KimaiError> {
        let scope = match self {
            ActivityStrategy::ProjectScoped => Some(project_id.clone()),
            ActivityStrategy::Global => None,
        };
        let candidates = kimai.search_activities(scope, name).await?;
        debug!(
            "{:?} activity search for {:?} returned {} candidates",
            self,
            name,
            candidates.len()
        );

        Ok(self.select(candidates, project_id, name))
    }
}

/// 名前からKimaiのプロジェクト、アクティビティを解決する。
pub struct EntityResolver<'a, T: KimaiRepository + ?Sized> {
    kimai: &'a T,
}

impl<'a, T: KimaiRepository + ?Sized> EntityResolver<'a, T> {
    /// 新しい`EntityResolver`を返す。
    pub fn new(kimai: &'a T) -> Self {
        Self { kimai }
    }

    /// プロジェクトを名前で解決する。
    ///
    /// 検索結果に大文字小文字を無視して名前が完全一致するものがあればそれを採用し、
    /// なければ検索結果の先頭を採用する。検索結果が空の場合はエラーとする。
    pub async fn resolve_project(&self, name: &str) -> Result<Project, ImportError> {
        let candidates = self.kimai.search_projects(name).await?;
        debug!(
            "Project search for {:?} returned {} candidates",
            name,
            candidates.len()
        );

        let project = select_project(candidates, name).ok_or_else(|| ImportError::NotFound {
            kind: EntityKind::Project,
            name: name.to_string(),
        })?;
        info!(
            "Resolved project {:?} to #{} ({})",
            name,
            project.id,
            project.name.as_deref().unwrap_or("")
        );

        Ok(project)
    }

    /// アクティビティを名前で解決する。
    pub async fn resolve_activity(
        &self,
        project_id: &EntityId,
        name: &str,
    ) -> Result<Activity, ImportError> {
        for strategy in ACTIVITY_STRATEGIES {
            if let Some(activity) = strategy.find(self.kimai, project_id, name).await? {
                info!(
                    "Resolved activity {:?} to #{} with {:?} search",
                    name, activity.id, strategy
                );
                return Ok(activity);
            }
        }

        Err(ImportError::NotFound {
            kind: EntityKind::Activity,
            name: name.to_string(),
        })
    }
}

/// 検索結果の中から採用するプロジェクトを選ぶ。
fn select_project(candidates: Vec<Project>, name: &str) -> Option<Project> {
    let exact = candidates
        .iter()
        .position(|project| name_matches(project.name.as_deref(), name));

    match exact {
        Some(index) => candidates.into_iter().nth(index),
        None => {
            let first = candidates.into_iter().next();
            if let Some(project) = &first {
                warn!(
                    "No exact match for project {:?}, using first search result #{} ({})",
                    name,
                    project.id,
                    project.name.as_deref().unwrap_or("")
                );
            }
            first
        }
    }
}

/// 大文字小文字を無視して名前が一致するかどうか。
fn name_matches(candidate: Option<&str>, name: &str) -> bool {
    candidate.map_or(false, |candidate| {
        candidate.to_lowercase() == name.to_lowercase()
    })
}
