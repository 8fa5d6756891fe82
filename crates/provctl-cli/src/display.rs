//! Display formatting for CLI output

use console::style;
use provctl_core::{ManagementGroup, ProviderInstance};
use provctl_kube::{ApplyReport, UpgradePlan};

fn watching(instance: &ProviderInstance) -> &str {
    if instance.watched_namespace.is_empty() {
        "(all)"
    } else {
        &instance.watched_namespace
    }
}

/// Table of installed instances
pub fn print_instances(instances: &[ProviderInstance]) {
    println!(
        "{:<20} {:<28} {:<16} {:<10} {:<20}",
        style("NAMESPACE").bold(),
        style("NAME").bold(),
        style("TYPE").bold(),
        style("VERSION").bold(),
        style("WATCHING").bold()
    );
    for instance in instances {
        println!(
            "{:<20} {:<28} {:<16} {:<10} {:<20}",
            instance.namespace,
            instance.manifest_label,
            instance.provider_type.to_string(),
            instance.version,
            watching(instance)
        );
    }
}

pub fn print_groups(groups: &[ManagementGroup]) {
    for group in groups {
        println!(
            "\n{} {}",
            style("Management group:").bold(),
            style(&group.core_provider).cyan()
        );
        for member in group.non_core() {
            println!("  {} {}", style("•").dim(), member);
        }
    }
}

pub fn print_plan(plan: &UpgradePlan) {
    let status = if plan.is_up_to_date() {
        style("up to date").green()
    } else {
        style("upgrades available").yellow()
    };
    println!(
        "\n{} {}, contract {} ({})",
        style("Management group:").bold(),
        style(&plan.core_provider).cyan(),
        style(&plan.contract).yellow(),
        status
    );
    println!(
        "{:<20} {:<28} {:<12} {:<12}",
        style("NAMESPACE").bold(),
        style("NAME").bold(),
        style("CURRENT").bold(),
        style("NEXT").bold()
    );
    for item in &plan.providers {
        let next = if item.is_pending() {
            style(item.next_version.as_str()).green()
        } else {
            style("-").dim()
        };
        println!(
            "{:<20} {:<28} {:<12} {:<12}",
            item.provider.namespace, item.provider.manifest_label, item.provider.version, next
        );
    }
}

pub fn print_report(report: &ApplyReport, verb: &str) {
    for item in &report.applied {
        println!("{} {} {}", style("✓").green().bold(), verb, style(item).cyan());
    }
    for failed in &report.failed {
        println!("{} {}: {}", style("✗").red().bold(), style(&failed.item).cyan(), failed.error);
    }
}
