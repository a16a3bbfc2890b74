//! Integration tests for node create / get / update and listing.

use assert_matches::assert_matches;
use curriculum_core::error::CoreError;
use curriculum_core::node_type::NodeType;
use curriculum_core::types::DbId;
use curriculum_db::error::TreeError;
use curriculum_db::models::curriculum::CreateCurriculum;
use curriculum_db::models::node::{CreateNode, UpdateNode};
use curriculum_db::repositories::CurriculumRepo;
use curriculum_db::tree_manager::NodeTreeManager;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_curriculum(pool: &PgPool, title: &str) -> DbId {
    CurriculumRepo::create(
        pool,
        &CreateCurriculum {
            title: title.to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

fn new_node(curriculum_id: DbId, parent_node_id: Option<DbId>, title: &str) -> CreateNode {
    CreateNode {
        curriculum_id,
        title: title.to_string(),
        parent_node_id,
        node_type: None,
        description: None,
    }
}

fn typed(mut input: CreateNode, node_type: NodeType) -> CreateNode {
    input.node_type = Some(node_type);
    input
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_root_defaults(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool.clone());

    let node = manager.create(&new_node(cid, None, "  Linear equations ")).await.unwrap();
    assert_eq!(node.order_index, 0);
    assert_eq!(node.node_type, NodeType::Topic);
    assert_eq!(node.title, "Linear equations");
    assert!(node.parent_node_id.is_none());
    assert!(node.is_active());

    let content = manager.get_content(node.id).await.unwrap();
    assert_eq!(content.markdown_content, "");
    assert!(content.deleted_at.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_appends_after_max(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool.clone());

    let chapter = manager
        .create(&typed(new_node(cid, None, "Chapter 1"), NodeType::Chapter))
        .await
        .unwrap();
    let a = manager.create(&new_node(cid, Some(chapter.id), "A")).await.unwrap();
    let b = manager.create(&new_node(cid, Some(chapter.id), "B")).await.unwrap();
    let c = manager.create(&new_node(cid, Some(chapter.id), "C")).await.unwrap();
    assert_eq!((a.order_index, b.order_index, c.order_index), (0, 1, 2));

    // Gaps left by deletes are not refilled.
    manager.delete(c.id).await.unwrap();
    manager.delete(a.id).await.unwrap();
    let d = manager.create(&new_node(cid, Some(chapter.id), "D")).await.unwrap();
    assert_eq!(d.order_index, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_rejects_blank_title(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool);

    let err = manager.create(&new_node(cid, None, "   ")).await.unwrap_err();
    assert_matches!(err, TreeError::Core(CoreError::Validation(_)));

    let err = manager.create(&new_node(cid, None, "")).await.unwrap_err();
    assert_matches!(err, TreeError::Core(CoreError::Validation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_rejects_overlong_title(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool);

    let err = manager
        .create(&new_node(cid, None, &"x".repeat(501)))
        .await
        .unwrap_err();
    assert_matches!(err, TreeError::Core(CoreError::Validation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_missing_parent_or_curriculum(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool);

    let err = manager.create(&new_node(cid, Some(9999), "Orphan")).await.unwrap_err();
    assert_matches!(
        err,
        TreeError::Core(CoreError::NotFound { entity: "Node", id: 9999 })
    );

    let err = manager.create(&new_node(9999, None, "Nowhere")).await.unwrap_err();
    assert_matches!(
        err,
        TreeError::Core(CoreError::NotFound { entity: "Curriculum", id: 9999 })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_under_deleted_parent_is_not_found(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool);

    let parent = manager.create(&new_node(cid, None, "Parent")).await.unwrap();
    manager.delete(parent.id).await.unwrap();

    let err = manager.create(&new_node(cid, Some(parent.id), "Child")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_parent_in_other_curriculum(pool: PgPool) {
    let algebra = new_curriculum(&pool, "Algebra").await;
    let biology = new_curriculum(&pool, "Biology").await;
    let manager = NodeTreeManager::new(pool);

    let parent = manager.create(&new_node(algebra, None, "Parent")).await.unwrap();
    let err = manager
        .create(&new_node(biology, Some(parent.id), "Stray"))
        .await
        .unwrap_err();
    assert_matches!(err, TreeError::Core(CoreError::ConstraintViolation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_under_leaf_type_rejected(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool);

    let question = manager
        .create(&typed(new_node(cid, None, "Q1"), NodeType::Question))
        .await
        .unwrap();
    let err = manager
        .create(&new_node(cid, Some(question.id), "Sub"))
        .await
        .unwrap_err();
    assert_matches!(err, TreeError::Core(CoreError::ConstraintViolation(_)));
}

// ---------------------------------------------------------------------------
// Get / update
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_unknown_node(pool: PgPool) {
    let manager = NodeTreeManager::new(pool);
    let err = manager.get(424242).await.unwrap_err();
    assert_matches!(err, TreeError::Core(CoreError::NotFound { id: 424242, .. }));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_partial_fields(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool);

    let mut input = new_node(cid, None, "Original");
    input.description = Some("keep me".to_string());
    let node = manager.create(&input).await.unwrap();

    let updated = manager
        .update(
            node.id,
            &UpdateNode {
                title: Some("Renamed".to_string()),
                node_type: Some(NodeType::Section),
                ..UpdateNode::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.node_type, NodeType::Section);
    assert_eq!(updated.description.as_deref(), Some("keep me"));
    assert_eq!(updated.order_index, node.order_index);
    assert!(updated.updated_at >= node.updated_at);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_description_none_keeps_empty_clears(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool);

    let mut input = new_node(cid, None, "Described");
    input.description = Some("old text".to_string());
    let node = manager.create(&input).await.unwrap();

    let kept = manager.update(node.id, &UpdateNode::default()).await.unwrap();
    assert_eq!(kept.description.as_deref(), Some("old text"));

    let cleared = manager
        .update(
            node.id,
            &UpdateNode {
                description: Some(String::new()),
                ..UpdateNode::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.description.as_deref(), Some(""));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_deleted_node_is_not_found(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool);

    let node = manager.create(&new_node(cid, None, "Doomed")).await.unwrap();
    manager.delete(node.id).await.unwrap();

    let err = manager
        .update(
            node.id,
            &UpdateNode {
                title: Some("Too late".to_string()),
                ..UpdateNode::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_to_leaf_with_children_rejected(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool);

    let parent = manager.create(&new_node(cid, None, "Parent")).await.unwrap();
    let child = manager.create(&new_node(cid, Some(parent.id), "Child")).await.unwrap();

    let to_content = UpdateNode {
        node_type: Some(NodeType::Content),
        ..UpdateNode::default()
    };
    let err = manager.update(parent.id, &to_content).await.unwrap_err();
    assert_matches!(err, TreeError::Core(CoreError::ConstraintViolation(_)));

    // Once the only child is gone the change is allowed.
    manager.delete(child.id).await.unwrap();
    let updated = manager.update(parent.id, &to_content).await.unwrap();
    assert_eq!(updated.node_type, NodeType::Content);
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_by_type_groups_by_parent(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool);

    let ch1 = manager
        .create(&typed(new_node(cid, None, "Ch 1"), NodeType::Chapter))
        .await
        .unwrap();
    let ch2 = manager
        .create(&typed(new_node(cid, None, "Ch 2"), NodeType::Chapter))
        .await
        .unwrap();
    let q2 = manager
        .create(&typed(new_node(cid, Some(ch2.id), "Q"), NodeType::Question))
        .await
        .unwrap();
    let q1a = manager
        .create(&typed(new_node(cid, Some(ch1.id), "Q"), NodeType::Question))
        .await
        .unwrap();
    let q1b = manager
        .create(&typed(new_node(cid, Some(ch1.id), "Q"), NodeType::Question))
        .await
        .unwrap();
    let deleted = manager
        .create(&typed(new_node(cid, Some(ch1.id), "Q"), NodeType::Question))
        .await
        .unwrap();
    manager.delete(deleted.id).await.unwrap();

    let questions = manager.list_by_type(cid, NodeType::Question).await.unwrap();
    let ids: Vec<DbId> = questions.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![q1a.id, q1b.id, q2.id]);

    let chapters = manager.list_by_type(cid, NodeType::Chapter).await.unwrap();
    assert_eq!(chapters.len(), 2);
    assert!(manager.list_by_type(cid, NodeType::Project).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_children_root_and_nested(pool: PgPool) {
    let cid = new_curriculum(&pool, "Algebra").await;
    let manager = NodeTreeManager::new(pool);

    let root_a = manager.create(&new_node(cid, None, "A")).await.unwrap();
    let root_b = manager.create(&new_node(cid, None, "B")).await.unwrap();
    let child = manager.create(&new_node(cid, Some(root_a.id), "A.1")).await.unwrap();

    let roots: Vec<DbId> = manager
        .list_children(cid, None)
        .await
        .unwrap()
        .iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(roots, vec![root_a.id, root_b.id]);

    let kids = manager.list_children(cid, Some(root_a.id)).await.unwrap();
    assert_eq!(kids.len(), 1);
    assert_eq!(kids[0].id, child.id);

    let err = manager.list_children(cid, Some(9999)).await.unwrap_err();
    assert!(err.is_not_found());
}
