use refflow_error::Result;

use crate::execution::operators::input_data::InputDataOperator;
use crate::execution::operators::{operator_ref, PhysicalOperator, PhysicalOperatorRef};
use crate::logical::logical_input_data::LogicalInputData;
use crate::logical::operator::Node;

pub fn plan(node: Node<LogicalInputData>) -> Result<PhysicalOperatorRef> {
    Ok(operator_ref(PhysicalOperator::InputData(
        InputDataOperator::new(node.node.source),
    )))
}
