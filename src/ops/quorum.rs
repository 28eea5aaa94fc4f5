//! Quorum option management.
//!
//! Quorum options live in the corosync side of the cluster document, so an
//! update is validated locally, written into the document, distributed to
//! every node and only then committed. An empty value removes the option.

use crate::reports::{ForceCode, OperationAborted, ReportItem, ReportMessage};
use crate::validate::{
    canonical_boolean, run, DependsOnOption, MutuallyExclusive, NamesIn, OptionMap, ValidatorAll,
    ValueBoolean, ValueIntegerInRange,
};

use super::auth::authenticated_targets;
use super::env::{OperationEnv, Outcome};

const QUORUM_OPTIONS: &[&str] = &[
    "auto_tie_breaker",
    "last_man_standing",
    "last_man_standing_window",
    "two_node",
    "wait_for_all",
];

fn quorum_rules() -> ValidatorAll {
    ValidatorAll::new(vec![
        Box::new(
            NamesIn::new(QUORUM_OPTIONS.iter().copied(), "quorum").forceable(ForceCode::Force),
        ),
        Box::new(ValueBoolean::new("auto_tie_breaker")),
        Box::new(ValueBoolean::new("last_man_standing")),
        Box::new(ValueBoolean::new("two_node")),
        Box::new(ValueBoolean::new("wait_for_all")),
        // Milliseconds; corosync ignores anything shorter than a second.
        Box::new(ValueIntegerInRange::new(
            "last_man_standing_window",
            1000,
            2_000_000,
        )),
        Box::new(DependsOnOption::new(
            ["last_man_standing_window"],
            "last_man_standing",
            "quorum",
        )),
        // Two-node mode hard-codes the tie outcome; a tie breaker on top of
        // it would fight over the same vote.
        Box::new(MutuallyExclusive::new(
            ["auto_tie_breaker", "two_node"],
            "quorum",
        )),
    ])
}

pub async fn update_options(env: &mut OperationEnv, options: OptionMap) -> Outcome<()> {
    let result = update(env, options).await;
    env.outcome(result)
}

async fn update(env: &mut OperationEnv, options: OptionMap) -> Result<(), OperationAborted> {
    // Validating
    env.report_all(run(&quorum_rules(), &options));
    env.check()?;
    if options.is_empty() {
        return Ok(());
    }

    // The document changes before any node hears about it; nothing here is
    // durable until commit.
    let mut document = env.load_document().await?;
    for (name, pair) in &options {
        if pair.is_removal() {
            document.remove_quorum_option(name);
        } else {
            let value = canonical_boolean(pair.normalized())
                .unwrap_or(pair.normalized())
                .to_string();
            document.set_quorum_option(name, &value);
        }
    }

    // Executing + committing: every node takes the new document, then it
    // lands locally.
    let targets = env.inventory().targets();
    let authed = authenticated_targets(env, &targets).await?;
    let missing = super::missing_labels(&targets, &authed);
    if !missing.is_empty() {
        // A quorum config that part of the cluster never received is worse
        // than no change at all.
        env.report(ReportItem::error(
            ReportMessage::ClusterConfigDistributionNodesUnavailable { nodes: missing },
        ));
        return Err(OperationAborted);
    }
    env.commit(document, Some(&authed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::Severity;
    use crate::validate::options_from;

    #[test]
    fn a_clean_update_validates_quietly() {
        let options = options_from([
            ("auto_tie_breaker", "on"),
            ("last_man_standing", "1"),
            ("last_man_standing_window", "20000"),
        ]);
        assert!(run(&quorum_rules(), &options).is_empty());
    }

    #[test]
    fn window_without_last_man_standing_is_flagged() {
        let options = options_from([("last_man_standing_window", "20000")]);
        let items = run(&quorum_rules(), &options);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].message.code(), "PREREQUISITE_OPTION_MISSING");
    }

    #[test]
    fn two_node_conflicts_with_the_tie_breaker() {
        let options = options_from([("auto_tie_breaker", "1"), ("two_node", "1")]);
        let items = run(&quorum_rules(), &options);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].message.code(), "MUTUALLY_EXCLUSIVE_OPTIONS");

        // Removing one side of the pair is not a conflict.
        let options = options_from([("auto_tie_breaker", "1"), ("two_node", "")]);
        assert!(run(&quorum_rules(), &options).is_empty());
    }

    #[test]
    fn unknown_names_and_bad_values_arrive_together() {
        let options = options_from([("bogus", "1"), ("wait_for_all", "maybe")]);
        let items = run(&quorum_rules(), &options);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.severity == Severity::Error));
    }

    #[test]
    fn removal_values_validate_as_removals() {
        // An empty window is a removal even though the window has a range.
        let options = options_from([("last_man_standing_window", "")]);
        assert!(run(&quorum_rules(), &options).is_empty());
    }
}
