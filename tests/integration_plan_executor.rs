//! 计划执行器集成测试
//!
//! 覆盖执行器树编译、物化插入、拉取循环、行格式转换和
//! 单语句/多语句事务边界。

use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use reldb::api::{ExternalParam, RowDescriptor};
use reldb::core::{ColumnDef, Schema, Value, ValueType};
use reldb::query::executor::{
    add_materialization, build_executor_tree, clean_executor_tree, BaseExecutor, BoxedExecutor,
    ExecutionStatus, Executor, MemoryTracker, PlanExecutor,
};
use reldb::query::plan::{AggFunc, AggSpec, PlanNode, PlanNodeBody, PlanValue, SortOrder};
use reldb::storage::{MemoryStorage, StorageClient, Table};
use reldb::transaction::{TransactionManager, TransactionResult, TransactionState};
use reldb::DBResult;

// ==================== 测试辅助 ====================

fn users_table() -> Table {
    let schema = Schema::new(vec![
        ColumnDef::new("id", ValueType::Int),
        ColumnDef::new("name", ValueType::String),
    ]);
    Table::with_rows(
        "users",
        schema,
        vec![
            vec![Value::Int(1), Value::from("alice")],
            vec![Value::Int(2), Value::from("bob")],
            vec![Value::Int(3), Value::from("carol")],
        ],
    )
}

fn orders_table() -> Table {
    let schema = Schema::new(vec![
        ColumnDef::new("user_id", ValueType::Int),
        ColumnDef::new("amount", ValueType::Int),
    ]);
    Table::with_rows(
        "orders",
        schema,
        vec![
            vec![Value::Int(1), Value::Int(100)],
            vec![Value::Int(1), Value::Int(50)],
            vec![Value::Int(3), Value::Int(70)],
        ],
    )
}

struct TestHarness {
    storage: Arc<Mutex<MemoryStorage>>,
    txn_manager: Arc<TransactionManager>,
    executor: PlanExecutor<MemoryStorage>,
}

fn setup() -> TestHarness {
    setup_with_memory_limit(64 * 1024 * 1024)
}

fn setup_with_memory_limit(limit: usize) -> TestHarness {
    let mut storage = MemoryStorage::new();
    storage.create_table(users_table()).expect("创建users表失败");
    storage
        .create_table(orders_table())
        .expect("创建orders表失败");

    let storage = Arc::new(Mutex::new(storage));
    let txn_manager = Arc::new(TransactionManager::default());
    let executor = PlanExecutor::new(
        Arc::clone(&storage),
        Arc::clone(&txn_manager),
        Arc::new(MemoryTracker::new(limit)),
    );
    TestHarness {
        storage,
        txn_manager,
        executor,
    }
}

fn seq_scan(id: i64, table: &str) -> Arc<PlanNode> {
    Arc::new(PlanNode::new(
        id,
        PlanNodeBody::SeqScan {
            table: table.to_string(),
        },
    ))
}

fn users_desc() -> RowDescriptor {
    RowDescriptor::new(&["id", "name"])
}

// ==================== 基础执行场景 ====================

#[test]
fn test_seq_scan_single_statement_commit() {
    let h = setup();
    let plan = seq_scan(1, "users");
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 1)
        .expect("执行失败");

    assert_eq!(status.result, TransactionResult::Success);
    assert_eq!(status.rows.len(), 3);
    assert_eq!(status.rows[0]["id"], serde_json::json!(1));
    assert_eq!(status.rows[0]["name"], serde_json::json!("alice"));

    // 单语句事务在调用内关闭
    assert_eq!(h.txn_manager.active_count(), 0);
    assert_eq!(h.txn_manager.stats().committed.load(Ordering::Relaxed), 1);
}

#[test]
fn test_null_plan_leaves_status_untouched() {
    let h = setup();
    let mut status = ExecutionStatus::default();
    status.result = TransactionResult::Failure;

    h.executor
        .execute_plan(None, &[], &users_desc(), &mut status, 1)
        .expect("空计划不应出错");

    // 状态原封不动，也没有创建事务
    assert_eq!(status.result, TransactionResult::Failure);
    assert!(status.rows.is_empty());
    assert_eq!(h.txn_manager.stats().started.load(Ordering::Relaxed), 0);
}

#[test]
fn test_bare_update_mutates_whole_table() {
    let h = setup();
    let plan = Arc::new(PlanNode::new(
        1,
        PlanNodeBody::Update {
            table: "users".to_string(),
            assignments: vec![(1, PlanValue::Const(Value::from("x")))],
        },
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 1)
        .expect("执行失败");

    // 变更执行器不产生输出行
    assert_eq!(status.result, TransactionResult::Success);
    assert!(status.rows.is_empty());

    let snap = h.storage.lock().snapshot("users").expect("快照失败");
    assert!(snap.rows.iter().all(|r| r[1] == Value::from("x")));
}

#[test]
fn test_insert_plan() {
    let h = setup();
    let plan = Arc::new(PlanNode::new(
        1,
        PlanNodeBody::Insert {
            table: "users".to_string(),
            rows: vec![vec![Value::Int(4), Value::from("dave")]],
        },
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 1)
        .expect("执行失败");

    assert_eq!(status.result, TransactionResult::Success);
    assert!(status.rows.is_empty());
    assert_eq!(h.storage.lock().snapshot("users").unwrap().rows.len(), 4);
}

#[test]
fn test_delete_with_index_scan_child() {
    let h = setup();
    // 扫描 id=2 的行作为受害行
    let scan = Arc::new(PlanNode::new(
        2,
        PlanNodeBody::IndexScan {
            table: "users".to_string(),
            key_column: 0,
            key_value: PlanValue::Const(Value::Int(2)),
        },
    ));
    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::Delete {
            table: "users".to_string(),
        },
        vec![scan],
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 1)
        .expect("执行失败");

    assert_eq!(status.result, TransactionResult::Success);
    let snap = h.storage.lock().snapshot("users").expect("快照失败");
    assert_eq!(snap.rows.len(), 2);
    assert!(snap.rows.iter().all(|r| r[0] != Value::Int(2)));
}

#[test]
fn test_index_scan_with_param() {
    let h = setup();
    let plan = Arc::new(PlanNode::new(
        1,
        PlanNodeBody::IndexScan {
            table: "users".to_string(),
            key_column: 0,
            key_value: PlanValue::Param(0),
        },
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(
            Some(&plan),
            &[ExternalParam::Int(2)],
            &users_desc(),
            &mut status,
            1,
        )
        .expect("执行失败");

    assert_eq!(status.result, TransactionResult::Success);
    assert_eq!(status.rows.len(), 1);
    assert_eq!(status.rows[0]["name"], serde_json::json!("bob"));
}

#[test]
fn test_param_index_out_of_range_aborts() {
    let h = setup();
    let plan = Arc::new(PlanNode::new(
        1,
        PlanNodeBody::IndexScan {
            table: "users".to_string(),
            key_column: 0,
            key_value: PlanValue::Param(5),
        },
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 1)
        .expect("执行失败通过status报告");

    assert_eq!(status.result, TransactionResult::Failure);
    assert!(status.rows.is_empty());
    assert_eq!(h.txn_manager.stats().aborted.load(Ordering::Relaxed), 1);
}

// ==================== 结果处理算子 ====================

#[test]
fn test_limit_with_offset() {
    let h = setup();
    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::Limit {
            limit: Some(2),
            offset: 1,
        },
        vec![seq_scan(2, "users")],
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 1)
        .expect("执行失败");

    assert_eq!(status.result, TransactionResult::Success);
    assert_eq!(status.rows.len(), 2);
    assert_eq!(status.rows[0]["id"], serde_json::json!(2));
    assert_eq!(status.rows[1]["id"], serde_json::json!(3));
}

#[test]
fn test_projection_and_order_by_desc() {
    let h = setup();
    let order = Arc::new(PlanNode::with_children(
        2,
        PlanNodeBody::OrderBy {
            sort_items: vec![(0, SortOrder::Desc)],
        },
        vec![seq_scan(3, "users")],
    ));
    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::Projection { columns: vec![1] },
        vec![order],
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(
            Some(&plan),
            &[],
            &RowDescriptor::new(&["name"]),
            &mut status,
            1,
        )
        .expect("执行失败");

    assert_eq!(status.result, TransactionResult::Success);
    let names: Vec<_> = status.rows.iter().map(|r| r["name"].clone()).collect();
    assert_eq!(
        names,
        vec![
            serde_json::json!("carol"),
            serde_json::json!("bob"),
            serde_json::json!("alice"),
        ]
    );
}

#[test]
fn test_aggregate_group_by() {
    let h = setup();
    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::Aggregate {
            group_by: vec![0],
            aggregates: vec![
                AggSpec {
                    func: AggFunc::Count,
                    column: 1,
                },
                AggSpec {
                    func: AggFunc::Sum,
                    column: 1,
                },
            ],
        },
        vec![seq_scan(2, "orders")],
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(
            Some(&plan),
            &[],
            &RowDescriptor::new(&["user_id", "cnt", "total"]),
            &mut status,
            1,
        )
        .expect("执行失败");

    assert_eq!(status.result, TransactionResult::Success);
    // 分组键按全序排列
    assert_eq!(status.rows.len(), 2);
    assert_eq!(status.rows[0]["user_id"], serde_json::json!(1));
    assert_eq!(status.rows[0]["cnt"], serde_json::json!(2));
    assert_eq!(status.rows[0]["total"], serde_json::json!(150));
    assert_eq!(status.rows[1]["user_id"], serde_json::json!(3));
    assert_eq!(status.rows[1]["total"], serde_json::json!(70));
}

#[test]
fn test_aggregate_empty_input_no_group_by() {
    let h = setup();
    h.storage
        .lock()
        .delete_rows("orders", None)
        .expect("清空失败");

    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::Aggregate {
            group_by: vec![],
            aggregates: vec![AggSpec {
                func: AggFunc::Count,
                column: 0,
            }],
        },
        vec![seq_scan(2, "orders")],
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(
            Some(&plan),
            &[],
            &RowDescriptor::new(&["cnt"]),
            &mut status,
            1,
        )
        .expect("执行失败");

    // 无分组键时空输入仍产出一行
    assert_eq!(status.rows.len(), 1);
    assert_eq!(status.rows[0]["cnt"], serde_json::json!(0));
}

// ==================== 连接算子 ====================

#[test]
fn test_nested_loop_join() {
    let h = setup();
    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::NestedLoopJoin {
            left_key: 0,
            right_key: 0,
        },
        vec![seq_scan(2, "users"), seq_scan(3, "orders")],
    ));
    let desc = RowDescriptor::new(&["id", "name", "user_id", "amount"]);
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &desc, &mut status, 1)
        .expect("执行失败");

    assert_eq!(status.result, TransactionResult::Success);
    // alice有两笔订单，carol一笔，bob没有
    assert_eq!(status.rows.len(), 3);
    assert!(status
        .rows
        .iter()
        .all(|r| r["id"] == r["user_id"]));
}

#[test]
fn test_merge_join_on_sorted_inputs() {
    let h = setup();
    // users 和 orders 都已按连接键升序
    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::MergeJoin {
            left_key: 0,
            right_key: 0,
        },
        vec![seq_scan(2, "users"), seq_scan(3, "orders")],
    ));
    let desc = RowDescriptor::new(&["id", "name", "user_id", "amount"]);
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &desc, &mut status, 1)
        .expect("执行失败");

    assert_eq!(status.result, TransactionResult::Success);
    assert_eq!(status.rows.len(), 3);
    let amounts: Vec<_> = status.rows.iter().map(|r| r["amount"].clone()).collect();
    assert_eq!(
        amounts,
        vec![
            serde_json::json!(100),
            serde_json::json!(50),
            serde_json::json!(70),
        ]
    );
}

#[test]
fn test_merge_join_tolerates_short_rows() {
    let h = setup();
    // 宽度不足键列的行按 Null 键处理，不会中断执行
    let schema = Schema::new(vec![
        ColumnDef::new("user_id", ValueType::Int),
        ColumnDef::new("amount", ValueType::Int),
    ]);
    h.storage
        .lock()
        .create_table(Table::with_rows(
            "ragged_orders",
            schema,
            vec![
                vec![Value::Int(1), Value::Int(100)],
                vec![],
                vec![Value::Int(3), Value::Int(70)],
            ],
        ))
        .expect("创建ragged_orders表失败");

    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::MergeJoin {
            left_key: 0,
            right_key: 0,
        },
        vec![seq_scan(2, "users"), seq_scan(3, "ragged_orders")],
    ));
    let desc = RowDescriptor::new(&["id", "name", "user_id", "amount"]);
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &desc, &mut status, 1)
        .expect("执行失败");

    // 短行不匹配任何连接键，其余行正常连接
    assert_eq!(status.result, TransactionResult::Success);
    assert_eq!(status.rows.len(), 2);
    let amounts: Vec<_> = status.rows.iter().map(|r| r["amount"].clone()).collect();
    assert_eq!(amounts, vec![serde_json::json!(100), serde_json::json!(70)]);
}

// ==================== 不支持节点的跳过语义 ====================

#[test]
fn test_unsupported_leaf_contributes_nothing() {
    let h = setup();
    // 不支持的叶子排在前面，扫描顶替为第一个子执行器
    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::Projection {
            columns: vec![0, 1],
        },
        vec![
            Arc::new(PlanNode::new(2, PlanNodeBody::Invalid)),
            seq_scan(3, "users"),
        ],
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 1)
        .expect("执行失败");

    assert_eq!(status.result, TransactionResult::Success);
    assert_eq!(status.rows.len(), 3);
}

#[test]
fn test_unsupported_root_with_single_child_is_skipped() {
    let h = setup();
    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::Invalid,
        vec![seq_scan(2, "users")],
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 1)
        .expect("执行失败");

    // 子树顶替被跳过的根
    assert_eq!(status.result, TransactionResult::Success);
    assert_eq!(status.rows.len(), 3);
}

#[test]
fn test_unsupported_node_with_multiple_children_aborts() {
    let h = setup();
    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::Invalid,
        vec![seq_scan(2, "users"), seq_scan(3, "orders")],
    ));
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 1)
        .expect("编译失败通过status报告");

    assert_eq!(status.result, TransactionResult::Failure);
    assert!(status.rows.is_empty());
    assert_eq!(h.txn_manager.stats().aborted.load(Ordering::Relaxed), 1);
}

// ==================== 事务边界 ====================

#[test]
fn test_multi_statement_txn_not_closed_on_success() {
    let h = setup();
    let txn = h.txn_manager.start_transaction(42).expect("开启事务失败");
    let plan = seq_scan(1, "users");
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 42)
        .expect("执行失败");

    // 调用方的事务保持活跃，由调用方负责关闭
    assert_eq!(status.result, TransactionResult::Success);
    assert_eq!(txn.state(), TransactionState::Active);
    assert_eq!(h.txn_manager.active_count(), 1);
    assert_eq!(h.txn_manager.stats().committed.load(Ordering::Relaxed), 0);

    h.txn_manager.commit_transaction(&txn).expect("提交失败");
}

#[test]
fn test_single_statement_failure_aborts() {
    let h = setup();
    let plan = seq_scan(1, "missing");
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 1)
        .expect("初始化失败通过status报告");

    assert_eq!(status.result, TransactionResult::Failure);
    assert!(status.rows.is_empty());
    assert_eq!(h.txn_manager.active_count(), 0);
    assert_eq!(h.txn_manager.stats().aborted.load(Ordering::Relaxed), 1);
}

#[test]
fn test_init_failure_closes_caller_owned_txn() {
    let h = setup();
    let txn = h.txn_manager.start_transaction(7).expect("开启事务失败");
    let plan = seq_scan(1, "missing");
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 7)
        .expect("初始化失败通过status报告");

    // 初始化失败时无论归属都强制中止
    assert_eq!(status.result, TransactionResult::Failure);
    assert_eq!(txn.state(), TransactionState::Aborted);
    assert_eq!(h.txn_manager.active_count(), 0);
}

#[test]
fn test_memory_limit_exceeded_fails_query() {
    let h = setup_with_memory_limit(1);
    let plan = seq_scan(1, "users");
    let mut status = ExecutionStatus::default();

    h.executor
        .execute_plan(Some(&plan), &[], &users_desc(), &mut status, 1)
        .expect("内存超限通过status报告");

    assert_eq!(status.result, TransactionResult::Failure);
    assert!(status.rows.is_empty());
    assert_eq!(h.txn_manager.stats().aborted.load(Ordering::Relaxed), 1);
}

// ==================== 编译与物化 ====================

#[test]
fn test_tree_shape_matches_plan() {
    let h = setup();
    let txn = h.txn_manager.start_transaction(1).expect("开启事务失败");
    let params = Arc::new(Vec::new());
    let plan = Arc::new(PlanNode::with_children(
        1,
        PlanNodeBody::NestedLoopJoin {
            left_key: 0,
            right_key: 0,
        },
        vec![seq_scan(2, "users"), seq_scan(3, "orders")],
    ));

    let root = build_executor_tree(None, Some(&plan), &txn, &params, &h.storage)
        .expect("编译失败")
        .expect("应产生执行器树");

    assert_eq!(root.name(), "NestedLoopJoinExecutor");
    assert_eq!(root.children().len(), 2);
    assert_eq!(root.children()[0].name(), "SeqScanExecutor");
    assert_eq!(root.children()[1].name(), "SeqScanExecutor");
    clean_executor_tree(root);
}

#[test]
fn test_materialization_trigger_set() {
    let h = setup();
    let txn = h.txn_manager.start_transaction(1).expect("开启事务失败");
    let params = Arc::new(Vec::new());

    // 扫描根需要物化
    let scan = seq_scan(1, "users");
    let root = build_executor_tree(None, Some(&scan), &txn, &params, &h.storage)
        .expect("编译失败");
    let wrapped = add_materialization(root).expect("应保留执行器树");
    assert_eq!(wrapped.name(), "MaterializeExecutor");
    assert!(wrapped.plan_node().is_none());
    clean_executor_tree(wrapped);

    // 投影根不需要物化
    let projection = Arc::new(PlanNode::with_children(
        2,
        PlanNodeBody::Projection { columns: vec![0] },
        vec![seq_scan(3, "users")],
    ));
    let root = build_executor_tree(None, Some(&projection), &txn, &params, &h.storage)
        .expect("编译失败");
    let unwrapped = add_materialization(root).expect("应保留执行器树");
    assert_eq!(unwrapped.name(), "ProjectionExecutor");
    clean_executor_tree(unwrapped);
}

// ==================== 销毁顺序 ====================

struct ProbeExecutor {
    base: BaseExecutor<MemoryStorage>,
    label: &'static str,
    order: Arc<Mutex<Vec<&'static str>>>,
}

impl ProbeExecutor {
    fn boxed(
        label: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    ) -> BoxedExecutor<MemoryStorage> {
        Box::new(Self {
            base: BaseExecutor::detached("ProbeExecutor"),
            label,
            order,
        })
    }
}

impl Executor<MemoryStorage> for ProbeExecutor {
    fn base(&self) -> &BaseExecutor<MemoryStorage> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseExecutor<MemoryStorage> {
        &mut self.base
    }

    fn init(&mut self) -> DBResult<()> {
        Ok(())
    }

    fn execute(&mut self) -> DBResult<bool> {
        Ok(false)
    }
}

impl Drop for ProbeExecutor {
    fn drop(&mut self) {
        self.order.lock().push(self.label);
    }
}

#[test]
fn test_teardown_is_post_order() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut child_a = ProbeExecutor::boxed("child_a", Arc::clone(&order));
    child_a.add_child(ProbeExecutor::boxed("grandchild", Arc::clone(&order)));
    let mut parent = ProbeExecutor::boxed("parent", Arc::clone(&order));
    parent.add_child(child_a);
    parent.add_child(ProbeExecutor::boxed("child_b", Arc::clone(&order)));

    clean_executor_tree(parent);

    // 子执行器严格先于父执行器释放
    assert_eq!(
        *order.lock(),
        vec!["grandchild", "child_a", "child_b", "parent"]
    );
}
