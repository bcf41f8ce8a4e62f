//! One projection rule per contract event.

use tracing::debug;

use super::{ProjectionError, RuleContext};
use crate::entity::{BetPatch, EventAggregate, League};
use crate::events::{
    BetCreated, BetPlaced, BetRefund, BetStateChanged, BetVotedOn, Dispute, Evidence,
    MetaEvidence, Ruling,
};
use crate::keys::BetKey;
use crate::store::WriteBatch;

fn single_bet_write(key: BetKey, patch: BetPatch) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.put_bet(key, patch);
    batch
}

/// A bet was created.
///
/// The event only carries classification fields, so the bet snapshot is read
/// from the contract. The bet is also filed under its event aggregate and,
/// when it names one, its league.
pub(super) fn bet_created(
    event: &BetCreated,
    ctx: &RuleContext<'_>,
) -> Result<WriteBatch, ProjectionError> {
    let record = ctx.ledger.bet_record(event.bet_id)?;
    let bet_key = BetKey::from_id(event.bet_id);
    let mut batch = WriteBatch::new();

    batch.put_bet(
        bet_key.clone(),
        BetPatch::created(
            &record,
            event.country,
            &event.league,
            event.category,
            ctx.block_timestamp,
        ),
    );

    let event_key = ctx
        .keys
        .event_key(&record.description, event.country, event.category);
    let mut aggregate = match ctx.store.load_event(&event_key)? {
        Some(existing) => existing,
        None => EventAggregate::new(
            event_key,
            record.description.as_str(),
            record.staking_deadline,
            event.country,
            event.league.as_str(),
            event.category,
        ),
    };
    aggregate.observe_staking_deadline(record.staking_deadline);
    aggregate.country = event.country;
    aggregate.league.clone_from(&event.league);
    aggregate.category = event.category;
    aggregate.bet_ids.push(event.bet_id);

    debug!(
        bet = %bet_key,
        event_key = %aggregate.id,
        members = aggregate.bet_ids.len(),
        start_time = %aggregate.start_time,
        "bet created"
    );
    batch.put_event(aggregate);

    if let Some(league_key) = ctx
        .keys
        .league_key(event.country, event.category, &event.league)
    {
        batch.put_league(League {
            id: league_key,
            league: event.league.clone(),
            category: event.category,
            country: event.country,
        });
    }

    Ok(batch)
}

pub(super) fn bet_placed(event: &BetPlaced, ctx: &RuleContext<'_>) -> WriteBatch {
    single_bet_write(
        BetKey::from_id(event.bet_id),
        BetPatch::placement(event.state, event.backer, ctx.block_timestamp),
    )
}

pub(super) fn bet_refund(event: &BetRefund, ctx: &RuleContext<'_>) -> WriteBatch {
    single_bet_write(
        BetKey::from_id(event.bet_id),
        BetPatch::refund(
            event.state,
            event.backer_stake,
            event.creator_stake,
            ctx.block_timestamp,
        ),
    )
}

pub(super) fn bet_state_changed(event: &BetStateChanged, ctx: &RuleContext<'_>) -> WriteBatch {
    single_bet_write(
        BetKey::from_id(event.bet_id),
        BetPatch::state_change(event.state, ctx.block_timestamp),
    )
}

/// Re-reads outcome, state and vote/evidence bits for `bet_id`.
fn read_through(
    bet_id: alloy_primitives::U256,
    ctx: &RuleContext<'_>,
) -> Result<WriteBatch, ProjectionError> {
    let outcome = ctx.ledger.outcome(bet_id)?;
    let state = ctx.ledger.state(bet_id)?;
    let flags = ctx.ledger.vote_evidence_bools(bet_id)?;

    Ok(single_bet_write(
        BetKey::from_id(bet_id),
        BetPatch::read_through(outcome, state, flags, ctx.block_timestamp),
    ))
}

/// A vote was cast. The event carries no final values.
pub(super) fn bet_voted_on(
    event: &BetVotedOn,
    ctx: &RuleContext<'_>,
) -> Result<WriteBatch, ProjectionError> {
    read_through(event.bet_id, ctx)
}

/// The arbitrator ruled on a dispute.
///
/// The outcome is taken from the ruling itself; the post-ruling state is
/// read from the contract. `timeUpdated` is left as it was.
pub(super) fn ruling(event: &Ruling, ctx: &RuleContext<'_>) -> Result<WriteBatch, ProjectionError> {
    let outcome = i32::try_from(event.ruling).map_err(|_| ProjectionError::InvalidPayload {
        event: "Ruling",
        details: format!("ruling {} does not fit an outcome code", event.ruling),
    })?;
    let bet_id = ctx.ledger.dispute_to_bet(event.dispute_id)?;
    let state = ctx.ledger.state(bet_id)?;

    debug!(
        bet = %BetKey::from_id(bet_id),
        dispute_id = %event.dispute_id,
        outcome,
        state,
        "ruling applied"
    );
    Ok(single_bet_write(
        BetKey::from_id(bet_id),
        BetPatch::ruling(state, outcome),
    ))
}

/// A dispute was raised against the bet identified by the evidence group.
pub(super) fn dispute(event: &Dispute, ctx: &RuleContext<'_>) -> Result<WriteBatch, ProjectionError> {
    let bet_id = event.evidence_group_id;
    let record = ctx.ledger.bet_record(bet_id)?;

    debug!(
        bet = %BetKey::from_id(bet_id),
        dispute_id = %event.dispute_id,
        state = record.state,
        "dispute raised"
    );
    Ok(single_bet_write(
        BetKey::from_id(bet_id),
        BetPatch::dispute(&record, event.dispute_id, ctx.block_timestamp),
    ))
}

/// Evidence was submitted for the bet identified by the evidence group.
pub(super) fn evidence(
    event: &Evidence,
    ctx: &RuleContext<'_>,
) -> Result<WriteBatch, ProjectionError> {
    read_through(event.evidence_group_id, ctx)
}

pub(super) fn meta_evidence(event: &MetaEvidence) -> WriteBatch {
    single_bet_write(
        BetKey::from_id(event.meta_evidence_id),
        BetPatch::meta_evidence(&event.evidence),
    )
}
