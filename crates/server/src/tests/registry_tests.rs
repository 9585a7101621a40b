use super::*;
use shared::protocol::CraneLimits;

#[tokio::test]
async fn rooms_are_reused_per_crane_id() {
    let registry = Registry::new(Fleet::default());
    let id = CraneId::new("tower-1");

    let first = registry.get_or_create(&id).await;
    let second = registry.get_or_create(&id).await;

    let user = shared::domain::UserId::random();
    first.join(user).await;
    // The second handle observes presence registered through the first one:
    // both point at the same room.
    let replay = second.join(shared::domain::UserId::random()).await;
    assert_eq!(replay[0], shared::protocol::Action::Join(user));
}

#[tokio::test]
async fn fleet_configured_profiles_reach_the_room() {
    let mut profile = CraneProfile::with_defaults(CraneId::new("tower-1"));
    profile.limits = CraneLimits {
        lift_max: 3200.0,
        ..CraneLimits::default()
    };
    let registry = Registry::new(Fleet::from_profiles(vec![profile]));

    let handle = registry.get_or_create(&CraneId::new("tower-1")).await;
    let details = handle.details().await.expect("details");
    assert_eq!(details.limits.lift_max, 3200.0);
}

#[tokio::test]
async fn unknown_ids_get_a_default_profile() {
    let registry = Registry::new(Fleet::default());
    let handle = registry.get_or_create(&CraneId::new("never-configured")).await;
    let details = handle.details().await.expect("details");
    assert_eq!(details.id, CraneId::new("never-configured"));
    assert_eq!(details.limits.lift_max, CraneLimits::default().lift_max);
}

#[tokio::test]
async fn all_details_lists_only_the_configured_fleet() {
    let registry = Registry::new(Fleet::from_profiles(vec![
        CraneProfile::with_defaults(CraneId::new("b-crane")),
        CraneProfile::with_defaults(CraneId::new("a-crane")),
    ]));

    // A stray room for an unconfigured id must not show up in the listing.
    registry.get_or_create(&CraneId::new("stray")).await;

    let ids: Vec<String> = registry
        .all_details()
        .await
        .into_iter()
        .map(|details| details.id.0)
        .collect();
    assert_eq!(ids, vec!["a-crane", "b-crane"]);
}
