//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub const VARIABLES_TF: &str = r#"variable "region" {
  type    = string
  default = "eu-west-1"
}

variable "instance_count" {
  default = 2
}
"#;

pub const MAIN_TF: &str = r#"locals {
  name_prefix = "web-${var.region}"
}

data "aws_ami" "ubuntu" {
  most_recent = true
}

resource "aws_instance" "web" {
  count         = var.instance_count
  ami           = data.aws_ami.ubuntu.id
  instance_type = "t3.micro"
  tags = {
    Name = "${local.name_prefix}-${count.index}"
  }
}

module "vpc" {
  source = "./modules/vpc"
  region = var.region
}
"#;

pub const OUTPUTS_TF: &str = r#"output "web_ips" {
  value = aws_instance.web[*].private_ip
}

output "vpc_id" {
  value = module.vpc.id
}
"#;

pub const VPC_TF: &str = r#"variable "region" {
}

resource "aws_vpc" "this" {
  cidr_block = "10.0.0.0/16"
  tags       = { Region = var.region }
}

output "id" {
  value = aws_vpc.this.id
}
"#;

/// Writes `content` to `rel` under `root`, creating parent directories.
#[allow(dead_code)]
pub fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

/// Create a small Terraform workspace: a root module split over three files, a child module and
/// a `.terraform` cache directory that must be ignored.
///
/// Returns the workspace root (e.g. `<temp_dir>/infra/`).
#[allow(dead_code)]
pub fn create_test_workspace(temp_dir: &TempDir) -> PathBuf {
    let root = temp_dir.path().join("infra");
    write_file(&root, "variables.tf", VARIABLES_TF);
    write_file(&root, "main.tf", MAIN_TF);
    write_file(&root, "outputs.tf", OUTPUTS_TF);
    write_file(&root, "modules/vpc/main.tf", VPC_TF);
    write_file(
        &root,
        ".terraform/modules/vpc/main.tf",
        "variable \"cached\" {\n}\n",
    );
    root.canonicalize().unwrap()
}
