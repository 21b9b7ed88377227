use super::*;
use crate::config::default_config;
use crate::locate::declarations;
use crate::manifest::scan::Scan;
use crate::matcher::match_vm_resources;
use crate::recommendation::{IamRecommendation, MatchedIam, MatchedVm, VmRecommendation};
use crate::state::StateSnapshot;
use std::fs;
use tempfile::TempDir;

const VM_MANIFEST: &str = r#"provider "google" {
  project = "p"
}

resource "google_compute_instance" "default" {
  name         = "vm"
  machine_type = "g1-small"
  zone         = "z"

  boot_disk {
    initialize_params {
      image = "debian-cloud/debian-11"
    }
  }
}

resource "google_compute_instance" "batch" {
  name         = "batch"
  machine_type = var.batch_size
}
"#;

const IAM_MANIFEST: &str = r#"resource "google_service_account" "robot" {
  account_id = "robot"
  project    = var.project
}

resource "google_project_iam_binding" "editors" {
  project = var.project
  role    = "roles/editor"
  members = [
    "user:a@example.com",
    "serviceAccount:${google_service_account.robot.email}",
  ]
}

resource "google_project_iam_binding" "owners" {
  project = "${var.project}"
  role    = "roles/owner"
  members = [
    "user:boss@example.com",
  ]
}
"#;

fn manifest_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, contents) in files {
        fs::write(dir.path().join(name), contents).expect("write manifest");
    }
    dir
}

fn read(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join(name)).expect("read manifest")
}

fn matched_vm(name: &str, size: &str, id: &str) -> MatchedVm {
    MatchedVm {
        recommendation: VmRecommendation {
            instance_id: format!("//compute.googleapis.com/projects/p/zones/z/instances/{name}"),
            size: size.to_string(),
            recommendation_id: id.to_string(),
            recommendation_etag: format!("e-{id}"),
        },
        tf_resource_name: name.to_string(),
    }
}

fn matched_iam(resource: &str, member: &str, role: &str, add: Option<&str>, id: &str) -> MatchedIam {
    MatchedIam {
        recommendation: IamRecommendation {
            project: "p".to_string(),
            member: member.to_string(),
            role: role.to_string(),
            add: add.map(str::to_string),
            recommendation_id: id.to_string(),
            recommendation_etag: format!("e-{id}"),
        },
        resource_name: resource.to_string(),
        state_project: "p".to_string(),
    }
}

fn claim(id: &str, etag: &str) -> ClaimedRecommendation {
    ClaimedRecommendation {
        id: id.to_string(),
        etag: etag.to_string(),
    }
}

fn changed_lines(before: &str, after: &str) -> Vec<(String, String)> {
    before
        .lines()
        .zip(after.lines())
        .filter(|(old, new)| old != new)
        .map(|(old, new)| (old.to_string(), new.to_string()))
        .collect()
}

#[test]
fn vm_state_to_manifest_end_to_end() {
    let dir = manifest_dir(&[("main.tf", VM_MANIFEST), ("other.tf", "# nothing\n")]);
    let state: StateSnapshot = serde_json::from_str(
        r#"{"resources": [{"mode": "managed", "type": "google_compute_instance", "name": "default",
            "instances": [{"attributes": {"id": "projects/p/zones/z/instances/i"}}]}]}"#,
    )
    .expect("parse state");
    let recs = vec![VmRecommendation {
        instance_id: "//compute.googleapis.com/projects/p/zones/z/instances/i".to_string(),
        size: "n1-standard-2".to_string(),
        recommendation_id: "r1".to_string(),
        recommendation_etag: "e1".to_string(),
    }];
    let config = default_config();
    let matched = match_vm_resources(&state, &recs, &config);

    let report =
        apply_vm_edits(dir.path(), &matched, &config, &ApplyOptions::default()).expect("apply");

    assert_eq!(report.claimed, vec![claim("r1", "e1")]);
    assert_eq!(report.changed_files, vec![dir.path().join("main.tf")]);
    let after = read(&dir, "main.tf");
    assert_eq!(
        changed_lines(VM_MANIFEST, &after),
        vec![(
            "  machine_type = \"g1-small\"".to_string(),
            "  machine_type = \"n1-standard-2\"".to_string()
        )]
    );
    assert_eq!(after.len() - VM_MANIFEST.len(), "n1-standard-2".len() - "g1-small".len());
    assert_eq!(read(&dir, "other.tf"), "# nothing\n");
}

#[test]
fn vm_reapply_is_a_no_op_but_still_claimed() {
    let dir = manifest_dir(&[("main.tf", VM_MANIFEST)]);
    let config = default_config();
    let matched = vec![matched_vm("default", "n1-standard-2", "r1")];

    apply_vm_edits(dir.path(), &matched, &config, &ApplyOptions::default()).expect("first");
    let first = read(&dir, "main.tf");
    let report =
        apply_vm_edits(dir.path(), &matched, &config, &ApplyOptions::default()).expect("second");

    assert_eq!(report.claimed, vec![claim("r1", "e-r1")]);
    assert!(report.changed_files.is_empty());
    assert_eq!(read(&dir, "main.tf"), first);
}

#[test]
fn vm_variable_size_resolves_for_matching_and_is_replaced_in_original() {
    let dir = manifest_dir(&[
        ("main.tf", VM_MANIFEST),
        ("terraform.tfvars", "batch_size = \"n2-standard-8\"\n"),
    ]);
    let config = default_config();

    let unchanged = apply_vm_edits(
        dir.path(),
        &[matched_vm("batch", "n2-standard-8", "same")],
        &config,
        &ApplyOptions::default(),
    )
    .expect("apply same size");
    assert_eq!(unchanged.claimed, vec![claim("same", "e-same")]);
    assert!(unchanged.changed_files.is_empty());

    let report = apply_vm_edits(
        dir.path(),
        &[matched_vm("batch", "n2-standard-4", "r2")],
        &config,
        &ApplyOptions::default(),
    )
    .expect("apply");
    assert_eq!(report.claimed, vec![claim("r2", "e-r2")]);
    assert!(read(&dir, "main.tf").contains("  machine_type = \"n2-standard-4\"\n}"));
}

#[test]
fn vm_missing_declaration_is_skipped_without_claim() {
    let dir = manifest_dir(&[("main.tf", VM_MANIFEST)]);
    let report = apply_vm_edits(
        dir.path(),
        &[
            matched_vm("absent", "n1-standard-2", "r1"),
            matched_vm("default", "e2-small", "r2"),
            matched_vm("default", "e2-small", "r2"),
        ],
        &default_config(),
        &ApplyOptions::default(),
    )
    .expect("apply");
    assert_eq!(report.claimed, vec![claim("r2", "e-r2")]);
}

#[test]
fn vm_edits_to_one_file_fold_in_order() {
    let dir = manifest_dir(&[("main.tf", VM_MANIFEST)]);
    apply_vm_edits(
        dir.path(),
        &[
            matched_vm("default", "e2-small", "r1"),
            matched_vm("batch", "e2-large", "r2"),
        ],
        &default_config(),
        &ApplyOptions::default(),
    )
    .expect("apply");
    let after = read(&dir, "main.tf");
    assert_eq!(changed_lines(VM_MANIFEST, &after).len(), 2);
    assert!(after.contains("  machine_type = \"e2-small\"\n"));
    assert!(after.contains("  machine_type = \"e2-large\"\n"));
}

#[test]
fn write_dir_and_dry_run_control_output() {
    let dir = manifest_dir(&[("main.tf", VM_MANIFEST)]);
    let out = tempfile::tempdir().expect("tempdir");
    let write_dir = out.path().join("patched");
    let config = default_config();
    let matched = vec![matched_vm("default", "e2-small", "r1")];

    let dry = apply_vm_edits(
        dir.path(),
        &matched,
        &config,
        &ApplyOptions {
            write_dir: Some(write_dir.clone()),
            dry_run: true,
        },
    )
    .expect("dry run");
    assert_eq!(dry.claimed, vec![claim("r1", "e-r1")]);
    assert_eq!(dry.changed_files, vec![write_dir.join("main.tf")]);
    assert!(!write_dir.exists());

    apply_vm_edits(
        dir.path(),
        &matched,
        &config,
        &ApplyOptions {
            write_dir: Some(write_dir.clone()),
            dry_run: false,
        },
    )
    .expect("apply");
    assert_eq!(read(&dir, "main.tf"), VM_MANIFEST);
    let written = fs::read_to_string(write_dir.join("main.tf")).expect("read output");
    assert!(written.contains("machine_type = \"e2-small\""));
}

#[test]
fn missing_manifest_dir_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = apply_vm_edits(
        &dir.path().join("absent"),
        &[],
        &default_config(),
        &ApplyOptions::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn iam_member_with_others_remaining_comments_one_line() {
    let dir = manifest_dir(&[
        ("iam.tf", IAM_MANIFEST),
        ("terraform.tfvars", "project = \"p\"\n"),
    ]);
    let report = apply_iam_edits(
        dir.path(),
        &[matched_iam(
            "editors",
            "serviceAccount:robot@p.iam.gserviceaccount.com",
            "roles/editor",
            Some("roles/viewer"),
            "r1",
        )],
        &default_config(),
        &ApplyOptions::default(),
    )
    .expect("apply");

    assert_eq!(report.claimed, vec![claim("r1", "e-r1")]);
    let after = read(&dir, "iam.tf");
    assert_eq!(after.lines().count(), IAM_MANIFEST.lines().count());
    assert_eq!(
        changed_lines(IAM_MANIFEST, &after),
        vec![(
            "    \"serviceAccount:${google_service_account.robot.email}\",".to_string(),
            "    /* \"serviceAccount:${google_service_account.robot.email}\", */".to_string()
        )]
    );
}

#[test]
fn iam_last_member_without_add_comments_whole_block() {
    let dir = manifest_dir(&[
        ("iam.tf", IAM_MANIFEST),
        ("terraform.tfvars", "project = \"p\"\n"),
    ]);
    let report = apply_iam_edits(
        dir.path(),
        &[matched_iam("owners", "user:boss@example.com", "roles/owner", None, "r1")],
        &default_config(),
        &ApplyOptions::default(),
    )
    .expect("apply");

    assert_eq!(report.claimed, vec![claim("r1", "e-r1")]);
    let after = read(&dir, "iam.tf");
    let owners = IAM_MANIFEST
        .find("resource \"google_project_iam_binding\" \"owners\"")
        .unwrap();
    let block = &IAM_MANIFEST[owners..IAM_MANIFEST.len() - 1];
    assert_eq!(after, format!("{}/* {block} */\n", &IAM_MANIFEST[..owners]));
    assert!(declarations(&Scan::new(&after), "google_project_iam_binding")
        .iter()
        .all(|decl| decl.name != "owners"));
}

#[test]
fn iam_last_member_with_add_appends_rewritten_copy() {
    let dir = manifest_dir(&[
        ("iam.tf", IAM_MANIFEST),
        ("terraform.tfvars", "project = \"p\"\n"),
    ]);
    let report = apply_iam_edits(
        dir.path(),
        &[matched_iam(
            "owners",
            "user:boss@example.com",
            "roles/owner",
            Some("roles/editor"),
            "r1",
        )],
        &default_config(),
        &ApplyOptions::default(),
    )
    .expect("apply");

    assert_eq!(report.claimed, vec![claim("r1", "e-r1")]);
    let after = read(&dir, "iam.tf");
    let owners = IAM_MANIFEST
        .find("resource \"google_project_iam_binding\" \"owners\"")
        .unwrap();
    let block = &IAM_MANIFEST[owners..IAM_MANIFEST.len() - 1];
    let copy = block.replace("roles/owner", "roles/editor");
    assert_eq!(
        after,
        format!("{}/* {block} */\n\n{copy}\n", &IAM_MANIFEST[..owners])
    );
    let live: Vec<_> = declarations(&Scan::new(&after), "google_project_iam_binding")
        .into_iter()
        .map(|decl| decl.name)
        .collect();
    assert_eq!(live, vec!["editors", "owners"]);
}

#[test]
fn iam_sequential_removals_from_one_block() {
    let dir = manifest_dir(&[
        ("iam.tf", IAM_MANIFEST),
        ("terraform.tfvars", "project = \"p\"\n"),
    ]);
    let report = apply_iam_edits(
        dir.path(),
        &[
            matched_iam("editors", "user:a@example.com", "roles/editor", None, "r1"),
            matched_iam(
                "editors",
                "serviceAccount:robot@p.iam.gserviceaccount.com",
                "roles/editor",
                None,
                "r2",
            ),
            matched_iam("editors", "user:a@example.com", "roles/editor", None, "r3"),
        ],
        &default_config(),
        &ApplyOptions::default(),
    )
    .expect("apply");

    assert_eq!(report.claimed, vec![claim("r1", "e-r1"), claim("r2", "e-r2")]);
    let after = read(&dir, "iam.tf");
    assert_eq!(after.lines().count(), IAM_MANIFEST.lines().count());
    let live: Vec<_> = declarations(&Scan::new(&after), "google_project_iam_binding")
        .into_iter()
        .map(|decl| decl.name)
        .collect();
    assert_eq!(live, vec!["owners"]);
}

#[test]
fn iam_mismatched_role_or_project_is_not_claimed() {
    let dir = manifest_dir(&[
        ("iam.tf", IAM_MANIFEST),
        ("terraform.tfvars", "project = \"p\"\n"),
    ]);
    let mut wrong_project = matched_iam("owners", "user:boss@example.com", "roles/owner", None, "r2");
    wrong_project.state_project = "q".to_string();
    wrong_project.recommendation.project = "q".to_string();
    let report = apply_iam_edits(
        dir.path(),
        &[
            matched_iam("owners", "user:boss@example.com", "roles/editor", None, "r1"),
            wrong_project,
        ],
        &default_config(),
        &ApplyOptions::default(),
    )
    .expect("apply");
    assert!(report.claimed.is_empty());
    assert!(report.changed_files.is_empty());
    assert_eq!(read(&dir, "iam.tf"), IAM_MANIFEST);
}

#[test]
fn iam_without_variables_file_degrades_to_literal_matching() {
    let dir = manifest_dir(&[("iam.tf", IAM_MANIFEST)]);
    let report = apply_iam_edits(
        dir.path(),
        &[matched_iam("editors", "user:a@example.com", "roles/editor", None, "r1")],
        &default_config(),
        &ApplyOptions::default(),
    )
    .expect("apply");
    assert!(report.claimed.is_empty());
}

const SHARED_LINE_MANIFEST: &str = r#"resource "google_project_iam_binding" "admins" {
  project = "p"
  role    = "roles/editor"
  members = [var.admin, "user:b@example.com"]
}
"#;

fn remove_shared_line_member(member: &str) -> (PatchReport, String) {
    let dir = manifest_dir(&[
        ("iam.tf", SHARED_LINE_MANIFEST),
        ("terraform.tfvars", "admin = \"user:a@example.com\"\n"),
    ]);
    let report = apply_iam_edits(
        dir.path(),
        &[matched_iam("admins", member, "roles/editor", None, "r1")],
        &default_config(),
        &ApplyOptions::default(),
    )
    .expect("apply");
    (report, read(&dir, "iam.tf"))
}

#[test]
fn iam_variable_member_is_commented_in_original_list() {
    let (report, after) = remove_shared_line_member("user:a@example.com");
    assert_eq!(report.claimed, vec![claim("r1", "e-r1")]);
    assert_eq!(
        changed_lines(SHARED_LINE_MANIFEST, &after),
        vec![(
            "  members = [var.admin, \"user:b@example.com\"]".to_string(),
            "  members = [/* var.admin, */ \"user:b@example.com\"]".to_string()
        )]
    );
}

#[test]
fn iam_literal_member_next_to_variable_member_is_commented() {
    let (report, after) = remove_shared_line_member("user:b@example.com");
    assert_eq!(report.claimed, vec![claim("r1", "e-r1")]);
    assert_eq!(
        changed_lines(SHARED_LINE_MANIFEST, &after),
        vec![(
            "  members = [var.admin, \"user:b@example.com\"]".to_string(),
            "  members = [var.admin, /* \"user:b@example.com\" */]".to_string()
        )]
    );
}

#[test]
fn iam_expression_sibling_keeps_binding_active() {
    let manifest = r#"resource "google_project_iam_binding" "b" {
  project = "p"
  role    = "roles/editor"
  members = [
    local.admin,
    "user:b@example.com",
  ]
}
"#;
    let dir = manifest_dir(&[("iam.tf", manifest)]);
    let report = apply_iam_edits(
        dir.path(),
        &[matched_iam("b", "user:b@example.com", "roles/editor", Some("roles/viewer"), "r1")],
        &default_config(),
        &ApplyOptions::default(),
    )
    .expect("apply");

    assert_eq!(report.claimed, vec![claim("r1", "e-r1")]);
    let after = read(&dir, "iam.tf");
    assert_eq!(
        changed_lines(manifest, &after),
        vec![(
            "    \"user:b@example.com\",".to_string(),
            "    /* \"user:b@example.com\", */".to_string()
        )]
    );
    assert_eq!(after.lines().count(), manifest.lines().count());
}

#[test]
fn write_failure_aborts_the_run() {
    let dir = manifest_dir(&[("main.tf", VM_MANIFEST)]);
    let out = tempfile::tempdir().expect("tempdir");
    let blocker = out.path().join("not-a-dir");
    fs::write(&blocker, "file").expect("write blocker");

    let err = apply_vm_edits(
        dir.path(),
        &[matched_vm("default", "e2-small", "r1")],
        &default_config(),
        &ApplyOptions {
            write_dir: Some(blocker),
            dry_run: false,
        },
    )
    .unwrap_err();
    assert!(err.to_string().contains("create write dir"));
    assert_eq!(read(&dir, "main.tf"), VM_MANIFEST);
}
