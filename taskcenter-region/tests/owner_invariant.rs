/// Owner invariant under random member operations
///
/// Every account must keep at least one active owner after any successful
/// add or remove call, no matter who performs it.

use proptest::prelude::*;
use std::sync::Arc;
use taskcenter_region::store::{MemShardStore, ShardStore};
use taskcenter_region::{RegionOutcome, RegionPrivateApi, RegionRejection};
use taskcenter_shared::models::member::{AccountRole, AddMember};
use uuid::Uuid;

const POOL_SIZE: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Add { actor: usize, targets: Vec<(usize, u8)> },
    Remove { actor: usize, targets: Vec<usize> },
}

fn role_from(n: u8) -> AccountRole {
    match n % 4 {
        0 => AccountRole::Owner,
        1 => AccountRole::Admin,
        2 => AccountRole::MemberOfAllProjects,
        _ => AccountRole::MemberOfOnlySpecificProjects,
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..POOL_SIZE, prop::collection::vec((0..POOL_SIZE, any::<u8>()), 0..4))
            .prop_map(|(actor, targets)| Op::Add { actor, targets }),
        (0..POOL_SIZE, prop::collection::vec(0..POOL_SIZE, 0..4))
            .prop_map(|(actor, targets)| Op::Remove { actor, targets }),
    ]
}

async fn run_ops(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let store = Arc::new(MemShardStore::new(1));
    let api = RegionPrivateApi::new("us", store.clone() as Arc<dyn ShardStore>, 100);

    let account = Uuid::new_v4();
    let users: Vec<Uuid> = (0..POOL_SIZE).map(|_| Uuid::new_v4()).collect();
    let shard = api
        .create_account(account, users[0], "user0")
        .await
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

    for op in ops {
        let outcome = match op {
            Op::Add { actor, targets } => {
                let members = targets
                    .into_iter()
                    .map(|(idx, role)| AddMember {
                        id: users[idx],
                        name: format!("user{idx}"),
                        role: role_from(role),
                    })
                    .collect();
                api.add_members(shard, account, users[actor], members).await
            }
            Op::Remove { actor, targets } => {
                let ids = targets.into_iter().map(|idx| users[idx]).collect();
                api.remove_members(shard, account, users[actor], ids).await
            }
        };

        prop_assert!(!matches!(outcome, RegionOutcome::Failed(_)), "internal failure: {:?}", outcome);
        if let RegionOutcome::Rejected(rejection) = outcome {
            prop_assert!(rejection != RegionRejection::MaxEntityCountExceeded);
        }

        let owners = store
            .total_owner_count(shard, account)
            .await
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert!(owners >= 1, "account left with {} owners", owners);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn account_always_keeps_an_owner(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_ops(ops))?;
    }
}
