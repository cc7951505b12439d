use async_trait::async_trait;

use crate::models::QueueRequest;
use crate::TagEngineResult;

/// 外部工作队列抽象接口
///
/// 推送式队列：接受入队请求后由队列服务异步回调远端任务处理端点，
/// 投递语义为至少一次。`task_id` 随请求携带，在支持去重的实现上
/// 作为幂等键使用。本核心不做任何入队重试。
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// 提交一次入队请求
    async fn enqueue(&self, request: &QueueRequest) -> TagEngineResult<()>;
}
