//! In-memory fake of the cloud provider
//!
//! [`FakeProvider`] keeps per-region and account-global resource state,
//! paginates its listings, records every mutating call in order, and
//! enforces the same preconditions the real services do (a bucket must be
//! empty, a role must have no policies, a stack set must have no instances).
//! Failures are injected per operation as classified [`AwsError`]s.

use anyhow::{Context, Result};
use sra_cleanup::aws::AwsError;
use sra_cleanup::config::AccountTarget;
use sra_cleanup::provider::{
    ObjectVersion, Page, Provider, STACK_DELETE_FAILED, STACK_SET_DELETED, SessionError,
    SessionFactory, StackInstance, StackSetSummary, StackSummary, VersionMarker,
};
use sra_cleanup_common::ResourceKind;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const DELETE_IN_PROGRESS: &str = "DELETE_IN_PROGRESS";

/// Provider operations a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListStacks,
    DeleteStack,
    StackStatus,
    ListFunctions,
    DeleteFunction,
    ListRoles,
    ListAttachedRolePolicies,
    DetachRolePolicy,
    ListInlineRolePolicies,
    DeleteInlineRolePolicy,
    DeleteRole,
    ListParameters,
    DeleteParameters,
    ListLogGroups,
    DeleteLogGroup,
    ListBuckets,
    ListObjectVersions,
    DeleteObjectVersion,
    DeleteBucket,
    ListStackSets,
    ListStackInstances,
    DeleteStackInstances,
    DeleteStackSet,
}

/// What a stack does once its deletion is issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackBehavior {
    /// Gone by the first status check
    #[default]
    Vanish,
    /// Settles in `DELETE_FAILED`
    Fail,
    /// Stays in `DELETE_IN_PROGRESS` forever
    Hang,
}

/// A mutating call observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DeleteStack {
        region: String,
        name: String,
    },
    DeleteFunction {
        region: String,
        name: String,
    },
    DetachRolePolicy {
        role: String,
        policy_arn: String,
    },
    DeleteInlineRolePolicy {
        role: String,
        policy_name: String,
    },
    DeleteRole {
        role: String,
    },
    DeleteParameters {
        region: String,
        names: Vec<String>,
    },
    DeleteLogGroup {
        region: String,
        name: String,
    },
    DeleteObjectVersion {
        bucket: String,
        key: String,
        version_id: String,
    },
    DeleteBucket {
        bucket: String,
    },
    DeleteStackInstances {
        stack_set: String,
        accounts: Vec<String>,
        regions: Vec<String>,
    },
    DeleteStackSet {
        stack_set: String,
    },
}

impl Call {
    /// Resource type the call belongs to
    pub fn kind(&self) -> ResourceKind {
        match self {
            Call::DeleteStack { .. } => ResourceKind::Stack,
            Call::DeleteFunction { .. } => ResourceKind::Function,
            Call::DetachRolePolicy { .. }
            | Call::DeleteInlineRolePolicy { .. }
            | Call::DeleteRole { .. } => ResourceKind::Role,
            Call::DeleteParameters { .. } => ResourceKind::Parameter,
            Call::DeleteLogGroup { .. } => ResourceKind::LogGroup,
            Call::DeleteObjectVersion { .. } | Call::DeleteBucket { .. } => ResourceKind::Bucket,
            Call::DeleteStackInstances { .. } | Call::DeleteStackSet { .. } => {
                ResourceKind::StackSet
            }
        }
    }

    /// Whether the call deletes a resource itself rather than preparing it
    pub fn is_final_delete(&self) -> bool {
        !matches!(
            self,
            Call::DetachRolePolicy { .. }
                | Call::DeleteInlineRolePolicy { .. }
                | Call::DeleteObjectVersion { .. }
                | Call::DeleteStackInstances { .. }
        )
    }
}

#[derive(Debug)]
struct FakeStack {
    name: String,
    status: String,
    behavior: StackBehavior,
}

#[derive(Debug, Default)]
struct RegionState {
    stacks: Vec<FakeStack>,
    functions: Vec<String>,
    parameters: Vec<String>,
    log_groups: Vec<String>,
}

#[derive(Debug)]
struct FakeRole {
    name: String,
    attached: Vec<String>,
    inline: Vec<String>,
}

#[derive(Debug)]
struct FakeStackSet {
    name: String,
    status: String,
    instances: Vec<StackInstance>,
}

#[derive(Debug)]
struct Failure {
    op: Op,
    /// `None` matches every target
    target: Option<String>,
    error: AwsError,
}

#[derive(Debug, Default)]
struct State {
    regions: BTreeMap<String, RegionState>,
    roles: Vec<FakeRole>,
    buckets: BTreeMap<String, Vec<ObjectVersion>>,
    stack_sets: Vec<FakeStackSet>,
    failures: Vec<Failure>,
    calls: Vec<Call>,
}

impl State {
    fn check(&self, op: Op, target: &str) -> Result<()> {
        let failure = self
            .failures
            .iter()
            .find(|f| f.op == op && f.target.as_deref().is_none_or(|t| t == target));
        match failure {
            Some(f) => Err(f.error.clone().into()),
            None => Ok(()),
        }
    }

    fn region(&mut self, region: &str) -> &mut RegionState {
        self.regions.entry(region.to_string()).or_default()
    }

    fn role(&mut self, role: &str) -> Result<&mut FakeRole> {
        self.roles
            .iter_mut()
            .find(|r| r.name == role)
            .ok_or_else(|| not_found(format!("The role with name {role} cannot be found.")))
    }

    fn stack_set(&mut self, name: &str) -> Result<&mut FakeStackSet> {
        self.stack_sets
            .iter_mut()
            .find(|s| s.name == name && s.status != STACK_SET_DELETED)
            .ok_or_else(|| not_found(format!("StackSet {name} not found")))
    }
}

fn not_found(message: String) -> anyhow::Error {
    AwsError::NotFound { message }.into()
}

fn sdk_error(code: &str, message: &str) -> anyhow::Error {
    AwsError::Sdk {
        code: Some(code.to_string()),
        message: message.to_string(),
    }
    .into()
}

/// Remove `name` from `items`, reporting whether it was there
fn remove(items: &mut Vec<String>, name: &str) -> bool {
    let before = items.len();
    items.retain(|i| i != name);
    items.len() != before
}

fn paginate<T: Clone>(items: &[T], next: Option<String>, page_size: usize) -> Result<Page<T>> {
    let start = match next {
        Some(marker) => marker
            .parse::<usize>()
            .with_context(|| format!("invalid page marker {marker}"))?,
        None => 0,
    };
    let end = (start + page_size).min(items.len());
    let page = items.get(start..end).unwrap_or_default().to_vec();
    Ok(Page {
        items: page,
        next: (end < items.len()).then(|| end.to_string()),
    })
}

/// Recording in-memory provider
///
/// Clones share state, so a test can keep one handle for inspection while
/// the run owns another.
#[derive(Debug, Clone)]
pub struct FakeProvider {
    state: Arc<Mutex<State>>,
    page_size: usize,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            page_size: 50,
        }
    }

    /// Page size for every listing; small values exercise pagination
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_stack(self, region: &str, name: &str) -> Self {
        self.with_stack_behavior(region, name, StackBehavior::Vanish)
    }

    pub fn with_stack_behavior(self, region: &str, name: &str, behavior: StackBehavior) -> Self {
        self.state().region(region).stacks.push(FakeStack {
            name: name.to_string(),
            status: "CREATE_COMPLETE".to_string(),
            behavior,
        });
        self
    }

    pub fn with_function(self, region: &str, name: &str) -> Self {
        self.state().region(region).functions.push(name.to_string());
        self
    }

    pub fn with_parameters<I, S>(self, region: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state()
            .region(region)
            .parameters
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_log_group(self, region: &str, name: &str) -> Self {
        self.state().region(region).log_groups.push(name.to_string());
        self
    }

    pub fn with_role(self, name: &str, attached: &[&str], inline: &[&str]) -> Self {
        self.state().roles.push(FakeRole {
            name: name.to_string(),
            attached: attached.iter().map(|s| s.to_string()).collect(),
            inline: inline.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Add a bucket holding `(key, version_id)` versions and delete markers
    pub fn with_bucket(self, name: &str, versions: &[(&str, &str)], markers: &[(&str, &str)]) -> Self {
        let entry = |(key, version_id): &(&str, &str), is_delete_marker| ObjectVersion {
            key: key.to_string(),
            version_id: version_id.to_string(),
            is_delete_marker,
        };
        let mut objects: Vec<ObjectVersion> = versions
            .iter()
            .map(|v| entry(v, false))
            .chain(markers.iter().map(|m| entry(m, true)))
            .collect();
        objects.sort_by(|a, b| (&a.key, &a.version_id).cmp(&(&b.key, &b.version_id)));
        self.state().buckets.insert(name.to_string(), objects);
        self
    }

    /// Add a stack set with instances in `(account, region)` pairs
    pub fn with_stack_set(self, name: &str, status: &str, instances: &[(&str, &str)]) -> Self {
        self.state().stack_sets.push(FakeStackSet {
            name: name.to_string(),
            status: status.to_string(),
            instances: instances
                .iter()
                .map(|(account, region)| StackInstance {
                    account: account.to_string(),
                    region: region.to_string(),
                    status: "CURRENT".to_string(),
                })
                .collect(),
        });
        self
    }

    /// Make `op` fail with `error` for `target`, or for every target if `None`.
    ///
    /// The target is the region for regional listings, the role for role
    /// policy calls, the object key for version deletes and the resource name
    /// otherwise. Account-global listings only match `None`.
    pub fn fail(self, op: Op, target: Option<&str>, error: AwsError) -> Self {
        self.state().failures.push(Failure {
            op,
            target: target.map(str::to_string),
            error,
        });
        self
    }

    /// Every mutating call so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Names of resources of `kind` still present, in every scope
    pub fn remaining(&self, kind: ResourceKind) -> Vec<String> {
        let state = self.state();
        let regional = |pick: fn(&RegionState) -> Vec<String>| -> Vec<String> {
            state.regions.values().flat_map(pick).collect()
        };
        match kind {
            ResourceKind::Stack => regional(|r| {
                r.stacks
                    .iter()
                    .filter(|s| s.status != DELETE_IN_PROGRESS)
                    .map(|s| s.name.clone())
                    .collect()
            }),
            ResourceKind::Function => regional(|r| r.functions.clone()),
            ResourceKind::Parameter => regional(|r| r.parameters.clone()),
            ResourceKind::LogGroup => regional(|r| r.log_groups.clone()),
            ResourceKind::Role => state.roles.iter().map(|r| r.name.clone()).collect(),
            ResourceKind::Bucket => state.buckets.keys().cloned().collect(),
            ResourceKind::StackSet => state
                .stack_sets
                .iter()
                .filter(|s| s.status != STACK_SET_DELETED)
                .map(|s| s.name.clone())
                .collect(),
        }
    }

    /// Object versions and delete markers left in a bucket
    pub fn object_count(&self, bucket: &str) -> usize {
        self.state().buckets.get(bucket).map_or(0, Vec::len)
    }
}

impl Provider for FakeProvider {
    async fn list_stacks(&self, region: &str, next: Option<String>) -> Result<Page<StackSummary>> {
        let mut state = self.state();
        state.check(Op::ListStacks, region)?;
        let stacks: Vec<StackSummary> = state
            .region(region)
            .stacks
            .iter()
            .filter(|s| s.status != DELETE_IN_PROGRESS)
            .map(|s| StackSummary {
                name: s.name.clone(),
                status: s.status.clone(),
            })
            .collect();
        paginate(&stacks, next, self.page_size)
    }

    async fn delete_stack(&self, region: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteStack {
            region: region.to_string(),
            name: name.to_string(),
        });
        state.check(Op::DeleteStack, name)?;

        let stacks = &mut state.region(region).stacks;
        let idx = stacks
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| not_found(format!("Stack with id {name} does not exist")))?;
        match stacks[idx].behavior {
            StackBehavior::Vanish => {
                stacks.remove(idx);
            }
            StackBehavior::Fail => stacks[idx].status = STACK_DELETE_FAILED.to_string(),
            StackBehavior::Hang => stacks[idx].status = DELETE_IN_PROGRESS.to_string(),
        }
        Ok(())
    }

    async fn stack_status(&self, region: &str, name: &str) -> Result<Option<String>> {
        let mut state = self.state();
        state.check(Op::StackStatus, name)?;
        Ok(state
            .region(region)
            .stacks
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.status.clone()))
    }

    async fn list_functions(&self, region: &str, next: Option<String>) -> Result<Page<String>> {
        let mut state = self.state();
        state.check(Op::ListFunctions, region)?;
        paginate(&state.region(region).functions, next, self.page_size)
    }

    async fn delete_function(&self, region: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteFunction {
            region: region.to_string(),
            name: name.to_string(),
        });
        state.check(Op::DeleteFunction, name)?;
        if !remove(&mut state.region(region).functions, name) {
            return Err(not_found(format!("Function not found: {name}")));
        }
        Ok(())
    }

    async fn list_roles(&self, next: Option<String>) -> Result<Page<String>> {
        let state = self.state();
        state.check(Op::ListRoles, "")?;
        let names: Vec<String> = state.roles.iter().map(|r| r.name.clone()).collect();
        paginate(&names, next, self.page_size)
    }

    async fn list_attached_role_policies(&self, role: &str) -> Result<Vec<String>> {
        let mut state = self.state();
        state.check(Op::ListAttachedRolePolicies, role)?;
        Ok(state.role(role)?.attached.clone())
    }

    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DetachRolePolicy {
            role: role.to_string(),
            policy_arn: policy_arn.to_string(),
        });
        state.check(Op::DetachRolePolicy, role)?;
        if !remove(&mut state.role(role)?.attached, policy_arn) {
            return Err(not_found(format!("Policy {policy_arn} was not found.")));
        }
        Ok(())
    }

    async fn list_inline_role_policies(&self, role: &str) -> Result<Vec<String>> {
        let mut state = self.state();
        state.check(Op::ListInlineRolePolicies, role)?;
        Ok(state.role(role)?.inline.clone())
    }

    async fn delete_inline_role_policy(&self, role: &str, policy_name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteInlineRolePolicy {
            role: role.to_string(),
            policy_name: policy_name.to_string(),
        });
        state.check(Op::DeleteInlineRolePolicy, role)?;
        if !remove(&mut state.role(role)?.inline, policy_name) {
            return Err(not_found(format!(
                "The role policy with name {policy_name} cannot be found."
            )));
        }
        Ok(())
    }

    async fn delete_role(&self, role: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteRole {
            role: role.to_string(),
        });
        state.check(Op::DeleteRole, role)?;
        let found = state.role(role)?;
        if !found.attached.is_empty() || !found.inline.is_empty() {
            return Err(sdk_error(
                "DeleteConflict",
                "Cannot delete entity, must detach all policies first.",
            ));
        }
        state.roles.retain(|r| r.name != role);
        Ok(())
    }

    async fn list_parameters(&self, region: &str, next: Option<String>) -> Result<Page<String>> {
        let mut state = self.state();
        state.check(Op::ListParameters, region)?;
        paginate(&state.region(region).parameters, next, self.page_size)
    }

    async fn delete_parameters(&self, region: &str, names: Vec<String>) -> Result<Vec<String>> {
        let mut state = self.state();
        state.calls.push(Call::DeleteParameters {
            region: region.to_string(),
            names: names.clone(),
        });
        state.check(Op::DeleteParameters, region)?;
        if names.len() > 10 {
            return Err(sdk_error(
                "ValidationException",
                "Member must have length less than or equal to 10",
            ));
        }
        let parameters = &mut state.region(region).parameters;
        Ok(names
            .into_iter()
            .filter(|name| !remove(parameters, name))
            .collect())
    }

    async fn list_log_groups(&self, region: &str, next: Option<String>) -> Result<Page<String>> {
        let mut state = self.state();
        state.check(Op::ListLogGroups, region)?;
        paginate(&state.region(region).log_groups, next, self.page_size)
    }

    async fn delete_log_group(&self, region: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteLogGroup {
            region: region.to_string(),
            name: name.to_string(),
        });
        state.check(Op::DeleteLogGroup, name)?;
        if !remove(&mut state.region(region).log_groups, name) {
            return Err(not_found(format!(
                "The specified log group does not exist: {name}"
            )));
        }
        Ok(())
    }

    async fn list_buckets(&self, next: Option<String>) -> Result<Page<String>> {
        let state = self.state();
        state.check(Op::ListBuckets, "")?;
        let names: Vec<String> = state.buckets.keys().cloned().collect();
        paginate(&names, next, self.page_size)
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        next: Option<VersionMarker>,
    ) -> Result<Page<ObjectVersion, VersionMarker>> {
        let state = self.state();
        state.check(Op::ListObjectVersions, bucket)?;
        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| not_found(format!("The specified bucket does not exist: {bucket}")))?;

        // Objects are kept sorted, so the marker is a position in that order
        let after = |o: &&ObjectVersion| match &next {
            Some(m) => {
                let marker_version = m.version_id_marker.as_deref().unwrap_or_default();
                (o.key.as_str(), o.version_id.as_str()) > (m.key_marker.as_str(), marker_version)
            }
            None => true,
        };
        let remaining: Vec<&ObjectVersion> = objects.iter().filter(after).collect();
        let items: Vec<ObjectVersion> = remaining
            .iter()
            .take(self.page_size)
            .map(|o| (*o).clone())
            .collect();
        let next = match items.last() {
            Some(last) if remaining.len() > items.len() => Some(VersionMarker {
                key_marker: last.key.clone(),
                version_id_marker: Some(last.version_id.clone()),
            }),
            _ => None,
        };
        Ok(Page { items, next })
    }

    async fn delete_object_version(&self, bucket: &str, key: &str, version_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteObjectVersion {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version_id: version_id.to_string(),
        });
        state.check(Op::DeleteObjectVersion, key)?;
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| not_found(format!("The specified bucket does not exist: {bucket}")))?;
        objects.retain(|o| !(o.key == key && o.version_id == version_id));
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteBucket {
            bucket: bucket.to_string(),
        });
        state.check(Op::DeleteBucket, bucket)?;
        let empty = match state.buckets.get(bucket) {
            Some(objects) => objects.is_empty(),
            None => {
                return Err(not_found(format!(
                    "The specified bucket does not exist: {bucket}"
                )));
            }
        };
        if !empty {
            return Err(AwsError::BucketNotEmpty {
                message: "The bucket you tried to delete is not empty. \
                          You must delete all versions in the bucket."
                    .to_string(),
            }
            .into());
        }
        state.buckets.remove(bucket);
        Ok(())
    }

    async fn list_stack_sets(&self, next: Option<String>) -> Result<Page<StackSetSummary>> {
        let state = self.state();
        state.check(Op::ListStackSets, "")?;
        let sets: Vec<StackSetSummary> = state
            .stack_sets
            .iter()
            .map(|s| StackSetSummary {
                name: s.name.clone(),
                status: s.status.clone(),
            })
            .collect();
        paginate(&sets, next, self.page_size)
    }

    async fn list_stack_instances(
        &self,
        stack_set: &str,
        next: Option<String>,
    ) -> Result<Page<StackInstance>> {
        let mut state = self.state();
        state.check(Op::ListStackInstances, stack_set)?;
        let instances = state.stack_set(stack_set)?.instances.clone();
        paginate(&instances, next, self.page_size)
    }

    async fn delete_stack_instances(
        &self,
        stack_set: &str,
        accounts: Vec<String>,
        regions: Vec<String>,
    ) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteStackInstances {
            stack_set: stack_set.to_string(),
            accounts: accounts.clone(),
            regions: regions.clone(),
        });
        state.check(Op::DeleteStackInstances, stack_set)?;
        if accounts.len() != regions.len() || accounts.len() > 10 {
            return Err(sdk_error(
                "ValidationError",
                "Accounts and regions must be parallel lists of at most 10 entries",
            ));
        }
        let set = state.stack_set(stack_set)?;
        set.instances.retain(|i| {
            !accounts
                .iter()
                .zip(&regions)
                .any(|(a, r)| *a == i.account && *r == i.region)
        });
        Ok(())
    }

    async fn delete_stack_set(&self, stack_set: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteStackSet {
            stack_set: stack_set.to_string(),
        });
        state.check(Op::DeleteStackSet, stack_set)?;
        let set = state.stack_set(stack_set)?;
        if !set.instances.is_empty() {
            return Err(sdk_error(
                "StackSetNotEmptyException",
                "StackSet is not empty",
            ));
        }
        set.status = STACK_SET_DELETED.to_string();
        Ok(())
    }
}

/// Session factory handing out fake providers by credential profile
///
/// Profiles without a provider fail to connect.
#[derive(Debug, Clone, Default)]
pub struct FakeSessionFactory {
    sessions: HashMap<String, FakeProvider>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl FakeSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, profile: &str, provider: FakeProvider) -> Self {
        self.sessions.insert(profile.to_string(), provider);
        self
    }

    /// Profiles a connection was attempted for, in order
    pub fn attempts(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionFactory for FakeSessionFactory {
    type Session = FakeProvider;

    async fn connect(
        &self,
        account: &AccountTarget,
    ) -> std::result::Result<FakeProvider, SessionError> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(account.auth_profile.clone());
        self.sessions
            .get(&account.auth_profile)
            .cloned()
            .ok_or_else(|| SessionError::NoCredentials {
                profile: account.auth_profile.clone(),
            })
    }
}
