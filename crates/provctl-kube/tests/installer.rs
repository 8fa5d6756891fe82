//! Provider installer: validation scenarios and install flows

mod common;

use async_trait::async_trait;
use common::*;
use provctl_core::{Metadata, ProviderInstance, ProviderType, ViolationKind, Violations};
use provctl_kube::{
    InventoryStore, KubeError, MemoryInventory, ProviderInstaller, RecordingApplier,
};
use provctl_repo::{HookRegistry, InitHook};
use std::sync::{Arc, Mutex};

const V1ALPHA3: &[(u64, u64, &str)] = &[(1, 0, "v1alpha3")];
const V1ALPHA4_ONLY: &[(u64, u64, &str)] = &[(2, 0, "v1alpha4")];
const V1ALPHA3_1X: &[(u64, u64, &str)] = &[(1, 1, "v1alpha3"), (1, 0, "v1alpha3")];

type Installer = ProviderInstaller<MemoryInventory, RecordingApplier>;

/// Installer over an explicit snapshot; every existing instance uses `V1ALPHA3`
fn installer(existing: Vec<ProviderInstance>) -> Installer {
    let existing_metadata: Vec<(String, String, Metadata)> = existing
        .iter()
        .map(|i| (i.manifest_label.clone(), i.version.clone(), metadata(V1ALPHA3)))
        .collect();
    ProviderInstaller::with_snapshot(
        shared(repositories(vec![])),
        MemoryInventory::with_instances(existing.clone()),
        RecordingApplier::new(),
        existing,
        existing_metadata,
    )
}

fn violations(result: Result<(), KubeError>) -> Violations {
    match result {
        Ok(()) => Violations::new(),
        Err(e) => e.violations().cloned().expect("expected a topology error"),
    }
}

fn core_config() -> provctl_core::ProviderConfig {
    config(CORE, ProviderType::Core)
}

fn infra_config() -> provctl_core::ProviderConfig {
    config(INFRA, ProviderType::Infrastructure)
}

mod scenarios {
    use super::*;

    #[test]
    fn test_a_empty_cluster() {
        let mut installer = installer(vec![]);
        installer.add(components(core_config(), "v1.0.0", "capi-system", "", V1ALPHA3));
        installer.add(components(infra_config(), "v1.0.0", "infra1-system", "", V1ALPHA3));

        installer.validate().unwrap();
    }

    #[test]
    fn test_b_attaches_to_matching_core() {
        let mut installer =
            installer(vec![core("v1.0.0", "ns1", "ns1"), core("v1.0.0", "ns2", "ns2")]);
        installer.add(components(infra_config(), "v1.0.0", "infra1-ns1", "ns1", V1ALPHA3));

        installer.validate().unwrap();
    }

    #[test]
    fn test_c_namespace_duplicate() {
        let mut installer = installer(vec![
            core("v1.0.0", "capi-system", ""),
            infra("v1.0.0", "infra1-system", "ns1"),
        ]);
        installer.add(components(infra_config(), "v1.0.0", "infra1-system", "ns1", V1ALPHA3));

        let found = violations(installer.validate());
        assert_eq!(found.count_of(ViolationKind::DuplicateInstance), 1);
    }

    #[test]
    fn test_d_contract_mismatch() {
        let mut installer = installer(vec![core("v1.0.0", "capi-system", "")]);
        installer.add(components(infra_config(), "v2.0.0", "infra1-system", "", V1ALPHA4_ONLY));

        let found = violations(installer.validate());
        assert_eq!(found.len(), 1);
        assert_eq!(found.count_of(ViolationKind::IncompatibleContract), 1);
    }
}

mod properties {
    use super::*;

    #[test]
    fn test_universal_cores_always_overlap() {
        let mut installer = installer(vec![
            core("v1.0.0", "capi-system", ""),
            infra("v1.0.0", "infra1-system", ""),
        ]);
        installer.add(components(core_config(), "v1.0.0", "capi-other", "", V1ALPHA3));

        let found = violations(installer.validate());
        assert_eq!(found.count_of(ViolationKind::CoreOverlap), 1);
        // cores are not reported twice as same-type watch overlaps
        assert_eq!(found.count_of(ViolationKind::WatchOverlap), 0);
    }

    #[test]
    fn test_orphan_provider() {
        let mut installer = installer(vec![core("v1.0.0", "capi-system", "ns1")]);
        installer.add(components(infra_config(), "v1.0.0", "infra1-system", "ns2", V1ALPHA3));

        let found = violations(installer.validate());
        assert_eq!(found.count_of(ViolationKind::OrphanProvider), 1);
    }

    #[test]
    fn test_same_kind_other_namespace_with_overlap() {
        let mut installer = installer(vec![
            core("v1.0.0", "capi-system", ""),
            infra("v1.0.0", "infra1-a", "ns1"),
        ]);
        installer.add(components(infra_config(), "v1.0.0", "infra1-b", "ns1,ns2", V1ALPHA3));

        let found = violations(installer.validate());
        assert_eq!(found.count_of(ViolationKind::WatchOverlap), 1);
        assert_eq!(found.count_of(ViolationKind::DuplicateInstance), 0);
    }

    #[test]
    fn test_same_kind_other_namespace_disjoint() {
        let mut installer = installer(vec![
            core("v1.0.0", "capi-system", ""),
            infra("v1.0.0", "infra1-a", "ns1"),
        ]);
        installer.add(components(infra_config(), "v1.0.0", "infra1-b", "ns2", V1ALPHA3));

        installer.validate().unwrap();
    }

    #[test]
    fn test_namespace_overlap_is_exact() {
        let mut installer = installer(vec![
            core("v1.0.0", "capi-system", ""),
            infra("v1.0.0", "infra1-a", "foo"),
        ]);
        installer.add(components(infra_config(), "v1.0.0", "infra1-b", "foo-bar", V1ALPHA3));

        installer.validate().unwrap();
    }

    #[test]
    fn test_different_kinds_same_type_overlap() {
        let mut installer = installer(vec![core("v1.0.0", "capi-system", "")]);
        installer.add(components(infra_config(), "v1.0.0", "infra1-system", "", V1ALPHA3));
        installer.add(components(
            config(DOCKER, ProviderType::Infrastructure),
            "v1.0.0",
            "docker-system",
            "",
            V1ALPHA3,
        ));

        let found = violations(installer.validate());
        assert_eq!(found.count_of(ViolationKind::WatchOverlap), 1);
    }

    #[test]
    fn test_different_types_may_overlap() {
        let mut installer = installer(vec![core("v1.0.0", "capi-system", "")]);
        installer.add(components(infra_config(), "v1.0.0", "infra1-system", "", V1ALPHA3));
        installer.add(components(
            config(KUBEADM, ProviderType::Bootstrap),
            "v1.0.0",
            "kubeadm-system",
            "",
            V1ALPHA3,
        ));

        installer.validate().unwrap();
    }

    #[test]
    fn test_queue_duplicates_itself() {
        let mut installer = installer(vec![core("v1.0.0", "capi-system", "")]);
        installer.add(components(infra_config(), "v1.0.0", "infra1-system", "", V1ALPHA3));
        installer.add(components(infra_config(), "v1.0.0", "infra1-system", "", V1ALPHA3));

        let found = violations(installer.validate());
        assert_eq!(found.count_of(ViolationKind::DuplicateInstance), 1);
    }

    #[test]
    fn test_missing_metadata() {
        let mut installer = installer(vec![core("v1.0.0", "capi-system", "")]);
        let yaml = components_yaml(INFRA, "infra1-system", "v1.0.0");
        let bare = provctl_repo::Components::from_manifest(
            infra_config(),
            "v1.0.0",
            yaml.as_bytes(),
            &provctl_repo::ComponentsOptions::new(),
            &provctl_repo::MapVariables::new(),
        )
        .unwrap();
        installer.add(bare);

        let found = violations(installer.validate());
        assert_eq!(found.count_of(ViolationKind::MissingMetadata), 1);
    }

    #[test]
    fn test_violations_are_aggregated() {
        let mut installer = installer(vec![
            core("v1.0.0", "capi-system", "ns1"),
            infra("v1.0.0", "infra1-system", "ns1"),
        ]);
        // duplicate slot
        installer.add(components(infra_config(), "v1.0.0", "infra1-system", "ns1", V1ALPHA3));
        // orphan with an incompatible contract
        installer.add(components(
            config(KUBEADM, ProviderType::Bootstrap),
            "v2.0.0",
            "kubeadm-system",
            "ns9",
            V1ALPHA4_ONLY,
        ));

        let found = violations(installer.validate());
        assert_eq!(found.count_of(ViolationKind::DuplicateInstance), 1);
        assert_eq!(found.count_of(ViolationKind::OrphanProvider), 1);
        assert!(found.len() >= 2);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let mut installer = installer(vec![core("v1.0.0", "capi-system", "")]);
        installer.add(components(infra_config(), "v2.0.0", "infra1-system", "", V1ALPHA4_ONLY));
        installer.add(components(core_config(), "v1.0.0", "capi-other", "", V1ALPHA3));

        let first = violations(installer.validate());
        let second = violations(installer.validate());
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_images() {
        let mut installer = installer(vec![]);
        installer.add(components(core_config(), "v1.0.0", "capi-system", "", V1ALPHA3));
        installer.add(components(infra_config(), "v1.0.0", "infra1-system", "", V1ALPHA3));
        installer.add(components(infra_config(), "v1.0.0", "infra1-other", "", V1ALPHA3));

        assert_eq!(
            installer.images(),
            vec![
                "registry.example.com/cluster-api-controller:v1.0.0",
                "registry.example.com/infra1-controller:v1.0.0",
            ]
        );
    }
}

mod install {
    use super::*;

    fn repos() -> Arc<provctl_repo::Repositories> {
        shared(repositories(vec![
            (CORE, repository(CORE, &["v1.0.0"], V1ALPHA3)),
            ("infrastructure-infra1", repository(INFRA, &["v1.0.0", "v1.1.0"], V1ALPHA3)),
        ]))
    }

    #[tokio::test]
    async fn test_install_records_instances() {
        let inventory = MemoryInventory::new();
        let applier = RecordingApplier::new();
        let mut installer = ProviderInstaller::load(repos(), inventory.clone(), applier.clone())
            .await
            .unwrap();
        installer.add(components(core_config(), "v1.0.0", "capi-system", "", V1ALPHA3));
        installer.add(components(infra_config(), "v1.0.0", "infra1-system", "ns1", V1ALPHA3));

        let installed = installer.install().await.unwrap();
        assert_eq!(installed.len(), 2);

        let listed = inventory.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        let infra = listed.iter().find(|i| i.name == INFRA).unwrap();
        assert_eq!(infra.namespace, "infra1-system");
        assert_eq!(infra.watched_namespace, "ns1");
        assert!(infra.resource_version.is_some());

        assert_eq!(applier.applied_of_kind("CustomResourceDefinition").len(), 2);
        assert_eq!(
            applier.applied_of_kind("Deployment"),
            vec![
                "Deployment/capi-system/cluster-api-controller-manager",
                "Deployment/infra1-system/infra1-controller-manager",
            ]
        );
    }

    #[tokio::test]
    async fn test_validation_failure_installs_nothing() {
        let inventory = MemoryInventory::new();
        let applier = RecordingApplier::new();
        let mut installer = ProviderInstaller::load(repos(), inventory.clone(), applier.clone())
            .await
            .unwrap();
        installer.add(components(core_config(), "v1.0.0", "capi-system", "", V1ALPHA3));
        installer.add(components(infra_config(), "v2.0.0", "infra1-system", "", V1ALPHA4_ONLY));

        let err = installer.install().await.unwrap_err();
        assert!(err.violations().is_some());
        assert!(!err.is_retryable());
        assert_eq!(applier.count(), 0);
        assert_eq!(inventory.operation_counts().creates, 0);
    }

    #[tokio::test]
    async fn test_shared_objects_skipped_for_existing_kind() {
        let inventory = MemoryInventory::with_instances(vec![
            core("v1.0.0", "capi-system", ""),
            infra("v1.0.0", "infra1-a", "ns1"),
        ]);
        let applier = RecordingApplier::new();
        let mut installer = ProviderInstaller::load(repos(), inventory.clone(), applier.clone())
            .await
            .unwrap();
        installer.add(components(infra_config(), "v1.0.0", "infra1-b", "ns2", V1ALPHA3));
        installer.install().await.unwrap();

        assert!(applier.applied_of_kind("CustomResourceDefinition").is_empty());
        assert_eq!(applier.applied_of_kind("Deployment").len(), 1);

        // a newer version of the same kind reapplies them
        let applier = RecordingApplier::new();
        let mut installer = ProviderInstaller::load(repos(), inventory.clone(), applier.clone())
            .await
            .unwrap();
        installer.add(components(infra_config(), "v1.1.0", "infra1-c", "ns3", V1ALPHA3_1X));
        installer.install().await.unwrap();
        assert_eq!(applier.applied_of_kind("CustomResourceDefinition").len(), 1);
    }

    #[tokio::test]
    async fn test_queue_order_decides_shared_objects() {
        let applier = RecordingApplier::new();
        let mut installer =
            ProviderInstaller::load(repos(), MemoryInventory::new(), applier.clone())
                .await
                .unwrap();
        installer.add(components(core_config(), "v1.0.0", "capi-system", "", V1ALPHA3));
        installer.add(components(infra_config(), "v1.0.0", "infra1-a", "ns1", V1ALPHA3));
        installer.add(components(infra_config(), "v1.0.0", "infra1-b", "ns2", V1ALPHA3));
        installer.install().await.unwrap();

        let crds = applier.applied_of_kind("CustomResourceDefinition");
        assert_eq!(crds.iter().filter(|c| c.contains("infra1")).count(), 1);
    }

    #[tokio::test]
    async fn test_partial_apply_reports_each_item() {
        let inventory = MemoryInventory::new();
        let applier = RecordingApplier::new().fail_namespace("infra1-system");
        let mut installer = ProviderInstaller::load(repos(), inventory.clone(), applier)
            .await
            .unwrap();
        installer.add(components(core_config(), "v1.0.0", "capi-system", "", V1ALPHA3));
        installer.add(components(infra_config(), "v1.0.0", "infra1-system", "", V1ALPHA3));

        let err = installer.install().await.unwrap_err();
        let report = match err {
            KubeError::PartialApply(report) => report,
            other => panic!("expected a partial apply, got {other}"),
        };
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].manifest_label, "cluster-api");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].item.manifest_label, "infrastructure-infra1");
        assert_eq!(report.failed[0].item.namespace, "infra1-system");
        assert_eq!(report.failed[0].item.version, "v1.0.0");

        // nothing is rolled back
        assert_eq!(inventory.instance_count(), 1);
    }

    #[derive(Clone, Default)]
    struct RecordInit(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl InitHook for RecordInit {
        async fn run(&self, instance: &ProviderInstance) -> provctl_repo::Result<()> {
            self.0.lock().unwrap().push(instance.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_init_hook_runs_after_apply() {
        let hook = RecordInit::default();
        let mut hooks = HookRegistry::new();
        hooks.register_init("record", hook.clone());
        let repos = Arc::new(
            repositories(vec![(CORE, repository(CORE, &["v1.0.0"], V1ALPHA3))]).with_hooks(hooks),
        );

        let mut installer =
            ProviderInstaller::load(repos, MemoryInventory::new(), RecordingApplier::new())
                .await
                .unwrap();
        installer.add(components(
            core_config().with_init_hook("record"),
            "v1.0.0",
            "capi-system",
            "",
            V1ALPHA3,
        ));
        installer.install().await.unwrap();

        assert_eq!(*hook.0.lock().unwrap(), vec!["capi-system/cluster-api@v1.0.0"]);
    }

    #[tokio::test]
    async fn test_unregistered_init_hook_installs_nothing() {
        let inventory = MemoryInventory::new();
        let applier = RecordingApplier::new();
        let mut installer = ProviderInstaller::load(repos(), inventory.clone(), applier.clone())
            .await
            .unwrap();
        installer.add(components(
            core_config().with_init_hook("missing"),
            "v1.0.0",
            "capi-system",
            "",
            V1ALPHA3,
        ));

        let err = installer.install().await.unwrap_err();
        assert!(matches!(
            err,
            KubeError::Repo(provctl_repo::RepoError::HookNotFound { ref name }) if name == "missing"
        ));
        assert!(err.is_configuration());
        assert_eq!(applier.count(), 0);
        assert_eq!(inventory.operation_counts().creates, 0);
    }

    struct FailInit;

    #[async_trait]
    impl InitHook for FailInit {
        async fn run(&self, _instance: &ProviderInstance) -> provctl_repo::Result<()> {
            Err(provctl_repo::RepoError::HookFailed {
                name: "fail".to_string(),
                message: "credentials rejected".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_failed_init_hook_keeps_recorded_instance() {
        let mut hooks = HookRegistry::new();
        hooks.register_init("fail", FailInit);
        let repos = Arc::new(
            repositories(vec![
                (CORE, repository(CORE, &["v1.0.0"], V1ALPHA3)),
                ("infrastructure-infra1", repository(INFRA, &["v1.0.0"], V1ALPHA3)),
            ])
            .with_hooks(hooks),
        );
        let inventory = MemoryInventory::new();
        let applier = RecordingApplier::new();
        let mut installer = ProviderInstaller::load(repos, inventory.clone(), applier.clone())
            .await
            .unwrap();
        installer.add(components(core_config(), "v1.0.0", "capi-system", "", V1ALPHA3));
        installer.add(components(
            infra_config().with_init_hook("fail"),
            "v1.0.0",
            "infra1-a",
            "ns1",
            V1ALPHA3,
        ));
        installer.add(components(infra_config(), "v1.0.0", "infra1-b", "ns2", V1ALPHA3));

        let report = match installer.install().await.unwrap_err() {
            KubeError::PartialApply(report) => report,
            other => panic!("expected a partial apply, got {other}"),
        };
        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].item.namespace, "infra1-a");
        assert!(report.failed[0].error.contains("credentials rejected"));

        // the hook failed after the record was written
        assert_eq!(inventory.instance_count(), 3);
        let crds = applier.applied_of_kind("CustomResourceDefinition");
        assert_eq!(crds.iter().filter(|c| c.contains("infra1")).count(), 1);
    }

    #[tokio::test]
    async fn test_installed_provider_missing_from_catalog() {
        let inventory = MemoryInventory::with_instances(vec![
            core("v1.0.0", "capi-system", ""),
            ProviderInstance::new("vsphere", ProviderType::Infrastructure, "v1.0.0", "capv-system"),
        ]);
        let installer = ProviderInstaller::load(repos(), inventory, RecordingApplier::new())
            .await
            .unwrap();
        assert_eq!(installer.uncataloged(), ["infrastructure-vsphere"]);

        let found = violations(installer.validate());
        assert_eq!(found.count_of(ViolationKind::NotInCatalog), 1);
        assert_eq!(found.count_of(ViolationKind::MissingMetadata), 0);
        let message = found.iter().next().unwrap().to_string();
        assert!(message.contains("infrastructure-vsphere"));
    }

    #[tokio::test]
    async fn test_load_prefetches_existing_metadata() {
        let core_repo = repository(CORE, &["v1.0.0"], V1ALPHA3);
        let repos = shared(repositories(vec![(CORE, core_repo.clone())]));
        let inventory = MemoryInventory::with_instances(vec![core("v1.0.0", "capi-system", "")]);

        let mut installer = ProviderInstaller::load(repos, inventory, RecordingApplier::new())
            .await
            .unwrap();
        assert_eq!(core_repo.fetch_count(), 1);

        // validation uses the prefetched metadata and never touches the repository
        installer.add(components(infra_config(), "v2.0.0", "infra1-system", "", V1ALPHA4_ONLY));
        let found = violations(installer.validate());
        assert_eq!(found.count_of(ViolationKind::IncompatibleContract), 1);
        assert_eq!(core_repo.fetch_count(), 1);
    }
}
